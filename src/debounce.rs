//! Debounced document publishing
//!
//! Rapid document edits are applied locally right away; the remote write is
//! deferred until the document has been quiet for a fixed interval. Each new
//! edit aborts the pending timer and starts a fresh one.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Quiet-interval timer for document write-through
///
/// When the interval elapses the publisher sends a tick carrying its
/// generation number. A tick whose generation is no longer current was
/// queued before a later edit and must be ignored.
pub struct DocumentPublisher {
    quiet: Duration,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl DocumentPublisher {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            generation: 0,
            timer: None,
        }
    }

    pub fn quiet_interval(&self) -> Duration {
        self.quiet
    }

    /// Restart the quiet-interval timer
    ///
    /// `tick` builds the message sent on `tx` once the interval elapses.
    pub fn schedule<T, F>(&mut self, tx: mpsc::Sender<T>, tick: F) -> u64
    where
        T: Send + 'static,
        F: FnOnce(u64) -> T + Send + 'static,
    {
        self.abort_timer();
        self.generation += 1;
        let generation = self.generation;
        let quiet = self.quiet;

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            if tx.send(tick(generation)).await.is_err() {
                tracing::debug!(generation, "Document tick dropped, receiver closed");
            }
        }));
        generation
    }

    /// Whether a tick is the latest scheduled one
    ///
    /// Consumes the pending state: a current tick is accepted exactly once.
    pub fn take_if_current(&mut self, generation: u64) -> bool {
        if self.timer.is_none() || generation != self.generation {
            return false;
        }
        self.timer = None;
        true
    }

    /// Whether a write is waiting for the quiet interval
    pub fn is_pending(&self) -> bool {
        self.timer.is_some()
    }

    /// Drop any pending write
    pub fn cancel(&mut self) {
        self.abort_timer();
        self.generation += 1;
    }

    fn abort_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

impl Drop for DocumentPublisher {
    fn drop(&mut self) {
        self.abort_timer();
    }
}
