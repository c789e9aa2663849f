//! Serialized write-through
//!
//! Each live session owns one writer task. Writes are issued strictly in
//! enqueue order, and the session's echo guard is armed immediately before
//! every store write so the resulting self-notification is suppressed.

use crate::document::DocumentWrite;
use crate::echo::EchoGuard;
use crate::engine::Signal;
use crate::provider::DocumentStore;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What a write was for
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteKind {
    Seed,
    Messages,
    Mode,
    Document,
    /// Final write of a streamed reply
    StreamFinal { message_id: String },
}

/// Scalar fields carried by a write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Fields {
    pub title: bool,
    pub mode: bool,
    pub document: bool,
}

impl Fields {
    pub(crate) fn of(write: &DocumentWrite) -> Self {
        Self {
            title: write.title.is_some(),
            mode: write.mode.is_some(),
            document: write.document.is_some(),
        }
    }
}

/// Identifies a write when its completion is reported back
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WriteTicket {
    pub session_id: String,
    pub kind: WriteKind,
    /// Ids of the messages the write carries
    pub messages: Vec<String>,
    pub fields: Fields,
}

struct WriteJob {
    ticket: WriteTicket,
    write: DocumentWrite,
}

/// Handle to a session's writer task
///
/// Dropping the handle lets the task drain what is already queued and exit.
pub(crate) struct WriteQueue {
    tx: mpsc::UnboundedSender<WriteJob>,
}

impl WriteQueue {
    pub(crate) fn spawn(
        session_id: String,
        store: Arc<dyn DocumentStore>,
        guard: Arc<EchoGuard>,
        signals: mpsc::Sender<Signal>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteJob>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if guard.is_armed() {
                    // The store has not notified for the previous write yet
                    tracing::debug!(
                        session = %session_id,
                        kind = ?job.ticket.kind,
                        "Previous echo not yet observed"
                    );
                }
                guard.arm();
                let result = store
                    .write(&session_id, &job.write)
                    .await
                    .map_err(|e| e.to_string());

                if let Err(ref reason) = result {
                    // A failed write produces no echo
                    guard.consume();
                    tracing::warn!(
                        session = %session_id,
                        kind = ?job.ticket.kind,
                        error = %reason,
                        "Write-through failed"
                    );
                } else {
                    tracing::debug!(
                        session = %session_id,
                        kind = ?job.ticket.kind,
                        "Write-through completed"
                    );
                }

                if signals
                    .send(Signal::WriteFinished {
                        ticket: job.ticket,
                        result,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        Self { tx }
    }

    /// Queue a write; returns false when the writer task is gone
    pub(crate) fn enqueue(&self, ticket: WriteTicket, write: DocumentWrite) -> bool {
        self.tx.send(WriteJob { ticket, write }).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::MemoryStore;
    use crate::types::CreativeMode;
    use std::time::Duration;

    fn ticket(kind: WriteKind) -> WriteTicket {
        WriteTicket {
            session_id: "ses-1".to_string(),
            kind,
            messages: Vec::new(),
            fields: Fields::default(),
        }
    }

    async fn finished(rx: &mut mpsc::Receiver<Signal>) -> (WriteTicket, Result<(), String>) {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap()
        {
            Signal::WriteFinished { ticket, result } => (ticket, result),
            other => panic!("unexpected signal {:?}", other),
        }
    }

    #[test]
    fn test_fields_of_write() {
        let fields = Fields::of(&DocumentWrite::document("x").with_title("T"));
        assert!(fields.title && fields.document);
        assert!(!fields.mode);
    }

    #[tokio::test]
    async fn test_writes_in_order_and_arm_guard() {
        let store = MemoryStore::default();
        let guard = Arc::new(EchoGuard::new());
        let (tx, mut rx) = mpsc::channel(8);
        let queue =
            WriteQueue::spawn("ses-1".to_string(), Arc::new(store.clone()), guard.clone(), tx);

        assert!(queue.enqueue(ticket(WriteKind::Mode), DocumentWrite::mode(CreativeMode::Story)));
        assert!(queue.enqueue(ticket(WriteKind::Document), DocumentWrite::document("draft")));

        let (first, result) = finished(&mut rx).await;
        assert_eq!(first.kind, WriteKind::Mode);
        assert!(result.is_ok());
        let (second, _) = finished(&mut rx).await;
        assert_eq!(second.kind, WriteKind::Document);

        assert!(guard.consume());
        let writes = store.writes("ses-1").await;
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].document.as_deref(), Some("draft"));
    }
}
