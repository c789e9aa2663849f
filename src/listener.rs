//! Remote update listener
//!
//! Holds a standing store subscription for one session and forwards every
//! notification onto the engine's signal queue, tagged with the session id
//! it was opened for. Subscription failures are reported once and not
//! retried; retry policy belongs to the store.

use crate::document::{SessionPatch, StoredDocument};
use crate::engine::Signal;
use crate::error::SyncError;
use crate::provider::DocumentStore;
use crate::types::Message;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Turn a stored document into a patch for the local session
///
/// Blank titles and unknown modes leave the local value untouched.
/// Duplicate message ids collapse to one entry at the first position,
/// carrying the last content seen.
pub fn normalize(document: &StoredDocument) -> SessionPatch {
    let title = document
        .title
        .as_ref()
        .filter(|t| !t.trim().is_empty())
        .cloned();

    let mode = document.mode.as_deref().and_then(|raw| match raw.parse() {
        Ok(mode) => Some(mode),
        Err(e) => {
            tracing::debug!(session = %document.id, error = %e, "Ignoring remote mode");
            None
        }
    });

    let mut transcript: Vec<Message> = Vec::with_capacity(document.messages.len());
    for message in &document.messages {
        match transcript.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message.clone(),
            None => transcript.push(message.clone()),
        }
    }

    SessionPatch {
        title,
        mode,
        document: document.document.clone(),
        transcript: Some(transcript),
    }
}

/// Start listening to a session
///
/// Aborting the returned handle drops the subscription.
pub(crate) fn spawn(
    store: Arc<dyn DocumentStore>,
    session_id: String,
    signals: mpsc::Sender<Signal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut subscription = match store.subscribe(&session_id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                let error = subscribe_error(&session_id, e);
                let _ = signals
                    .send(Signal::RemoteFailed { session_id, error })
                    .await;
                return;
            }
        };

        tracing::debug!(session = %session_id, store = store.name(), "Remote listener started");

        loop {
            match subscription.next().await {
                Ok(Some(notification)) => {
                    let signal = Signal::RemoteChanged {
                        session_id: session_id.clone(),
                        document: notification.document,
                    };
                    if signals.send(signal).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!(session = %session_id, "Remote subscription closed");
                    break;
                }
                Err(e) => {
                    let error = subscribe_error(&session_id, e);
                    let _ = signals
                        .send(Signal::RemoteFailed {
                            session_id: session_id.clone(),
                            error,
                        })
                        .await;
                    break;
                }
            }
        }
    })
}

fn subscribe_error(session_id: &str, error: SyncError) -> SyncError {
    match error {
        SyncError::Subscribe { .. } => error,
        other => SyncError::Subscribe {
            session_id: session_id.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentWrite;
    use crate::provider::memory::MemoryStore;
    use crate::types::CreativeMode;
    use std::time::Duration;

    #[test]
    fn test_normalize_full_document() {
        let mut doc = StoredDocument::new("ses-1");
        doc.title = Some("Foxes".to_string());
        doc.mode = Some("POETRY".to_string());
        doc.document = Some("draft".to_string());
        doc.messages.push(Message::user("hi", CreativeMode::Poetry));

        let patch = normalize(&doc);
        assert_eq!(patch.title.as_deref(), Some("Foxes"));
        assert_eq!(patch.mode, Some(CreativeMode::Poetry));
        assert_eq!(patch.document.as_deref(), Some("draft"));
        assert_eq!(patch.transcript.unwrap().len(), 1);
    }

    #[test]
    fn test_normalize_ignores_blank_title_and_unknown_mode() {
        let mut doc = StoredDocument::new("ses-1");
        doc.title = Some("   ".to_string());
        doc.mode = Some("JAZZ".to_string());

        let patch = normalize(&doc);
        assert!(patch.title.is_none());
        assert!(patch.mode.is_none());
        assert!(patch.document.is_none());
        assert_eq!(patch.transcript, Some(Vec::new()));
    }

    #[test]
    fn test_normalize_collapses_duplicate_messages() {
        let first = Message::user("hi", CreativeMode::General);
        let mut reply = Message::assistant("Hel", CreativeMode::General);
        let mut doc = StoredDocument::new("ses-1");
        doc.messages.push(first.clone());
        doc.messages.push(reply.clone());
        reply.content = "Hello".to_string();
        doc.messages.push(reply.clone());
        doc.messages.push(first.clone());

        let transcript = normalize(&doc).transcript.unwrap();
        assert_eq!(transcript, vec![first, reply]);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let mut doc = StoredDocument::new("ses-1");
        doc.title = Some("T".to_string());
        doc.messages.push(Message::user("a", CreativeMode::General));
        assert_eq!(normalize(&doc), normalize(&doc));
    }

    #[test]
    fn test_subscribe_error_wraps_store_failures() {
        let wrapped = subscribe_error("ses-1", SyncError::Closed);
        assert!(matches!(
            wrapped,
            SyncError::Subscribe { ref session_id, ref reason }
                if session_id == "ses-1" && reason == "Session engine is closed"
        ));

        let original = SyncError::Subscribe {
            session_id: "ses-2".to_string(),
            reason: "denied".to_string(),
        };
        assert!(matches!(
            subscribe_error("ses-1", original),
            SyncError::Subscribe { ref session_id, .. } if session_id == "ses-2"
        ));
    }

    #[tokio::test]
    async fn test_listener_forwards_tagged_notifications() {
        let store = MemoryStore::default();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = spawn(Arc::new(store.clone()), "ses-1".to_string(), tx);

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            first,
            Signal::RemoteChanged { ref session_id, document: None } if session_id == "ses-1"
        ));

        store
            .write("ses-1", &DocumentWrite::document("hello"))
            .await
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match second {
            Signal::RemoteChanged { document, .. } => {
                assert_eq!(document.unwrap().document.as_deref(), Some("hello"));
            }
            other => panic!("unexpected signal {:?}", other),
        }

        handle.abort();
        let _ = handle.await;
        assert_eq!(store.subscriber_count("ses-1").await, 0);
    }
}
