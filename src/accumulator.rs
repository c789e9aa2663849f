//! Streaming accumulator
//!
//! Folds an incremental text stream into one assistant message that grows
//! in place by id. The accumulator does not touch session state directly:
//! each step returns the [`Transition`]s the engine applies.
//!
//! ```text
//! Idle ──chunk──▶ Streaming ──end──▶ Finalizing ──written──▶ Done
//!                     │
//!                  cancel ──▶ Cancelled
//! ```

use crate::state::Transition;
use crate::types::{CreativeMode, Message};

/// Lifecycle of one streamed reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// Waiting for the first chunk
    Idle,
    /// Placeholder inserted, chunks extend it
    Streaming,
    /// Stream exhausted, final write-through in flight
    Finalizing,
    /// Final write-through completed
    Done,
    /// Abandoned before finalizing; nothing is written
    Cancelled,
}

/// Accumulates one streamed assistant reply
#[derive(Debug, Clone)]
pub struct StreamingAccumulator {
    session_id: String,
    message: Message,
    state: AccumulatorState,
}

impl StreamingAccumulator {
    /// Prepare an accumulator; the message id is fixed up front so chunk
    /// signals can be matched before the placeholder exists
    pub fn new(session_id: impl Into<String>, mode: CreativeMode) -> Self {
        Self {
            session_id: session_id.into(),
            message: Message::placeholder(mode),
            state: AccumulatorState::Idle,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn message_id(&self) -> &str {
        &self.message.id
    }

    pub fn mode(&self) -> CreativeMode {
        self.message.mode
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    pub fn content(&self) -> &str {
        &self.message.content
    }

    /// Whether the placeholder has been inserted into the session
    pub fn has_placeholder(&self) -> bool {
        matches!(
            self.state,
            AccumulatorState::Streaming | AccumulatorState::Finalizing
        )
    }

    /// Fold one chunk in
    ///
    /// The first chunk inserts the empty placeholder before extending it.
    /// Empty chunks are dropped so every observed step strictly grows the
    /// content. Chunks outside `Idle`/`Streaming` are ignored.
    pub fn push(&mut self, chunk: &str) -> Vec<Transition> {
        let mut steps = Vec::with_capacity(2);
        match self.state {
            AccumulatorState::Idle => {
                steps.push(Transition::AppendMessage(self.message.clone()));
                self.state = AccumulatorState::Streaming;
            }
            AccumulatorState::Streaming => {}
            _ => return steps,
        }
        if !chunk.is_empty() {
            self.message.content.push_str(chunk);
            steps.push(Transition::ExtendMessage {
                id: self.message.id.clone(),
                chunk: chunk.to_string(),
            });
        }
        steps
    }

    /// Mark the stream exhausted
    ///
    /// Returns the full message to write through, or `None` when no chunk
    /// ever arrived (the accumulator is then `Done` with nothing to write).
    pub fn finish(&mut self) -> Option<Message> {
        match self.state {
            AccumulatorState::Streaming => {
                self.state = AccumulatorState::Finalizing;
                Some(self.message.clone())
            }
            AccumulatorState::Idle => {
                self.state = AccumulatorState::Done;
                None
            }
            _ => None,
        }
    }

    /// Record that the final write-through completed
    pub fn complete(&mut self) {
        if self.state == AccumulatorState::Finalizing {
            self.state = AccumulatorState::Done;
        }
    }

    /// Abandon the stream
    ///
    /// Returns the removal of the placeholder when one was inserted and not
    /// yet finalized.
    pub fn cancel(&mut self) -> Option<Transition> {
        match self.state {
            AccumulatorState::Idle => {
                self.state = AccumulatorState::Cancelled;
                None
            }
            AccumulatorState::Streaming => {
                self.state = AccumulatorState::Cancelled;
                Some(Transition::RemoveMessage(self.message.id.clone()))
            }
            _ => None,
        }
    }
}
