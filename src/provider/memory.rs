//! In-memory document store
//!
//! Keeps documents in process and fans changes out over a per-session
//! `tokio::sync::broadcast` channel. Useful for tests and for several
//! clients (tabs) sharing one process.

use crate::document::{DocumentWrite, StoreNotification, StoredDocument};
use crate::error::Result;
use crate::provider::{DocumentStore, StoreSubscription};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Per-session notification buffer; slow subscribers skip ahead
    pub channel_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    documents: HashMap<String, StoredDocument>,
    channels: HashMap<String, broadcast::Sender<StoreNotification>>,
    writes: HashMap<String, Vec<DocumentWrite>>,
}

/// In-memory shared document store
///
/// Cloning is cheap; clones share the same documents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    config: MemoryConfig,
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(MemoryState::default())),
        }
    }

    /// Every write received for a session, oldest first
    pub async fn writes(&self, session_id: &str) -> Vec<DocumentWrite> {
        let state = self.state.read().await;
        state.writes.get(session_id).cloned().unwrap_or_default()
    }

    /// Number of live subscriptions for a session
    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        let state = self.state.read().await;
        state
            .channels
            .get(session_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn subscribe(&self, session_id: &str) -> Result<Box<dyn StoreSubscription>> {
        // Snapshot and receiver are taken under one lock so no write falls
        // between them.
        let mut state = self.state.write().await;
        let capacity = self.config.channel_capacity.max(1);
        let rx = state
            .channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();
        let initial = StoreNotification {
            session_id: session_id.to_string(),
            document: state.documents.get(session_id).cloned(),
        };

        tracing::debug!(session = %session_id, "Memory subscription opened");

        Ok(Box::new(MemorySubscription {
            session_id: session_id.to_string(),
            initial: Some(initial),
            stream: BroadcastStream::new(rx),
        }))
    }

    async fn write(&self, session_id: &str, write: &DocumentWrite) -> Result<()> {
        let mut state = self.state.write().await;
        let document = state
            .documents
            .entry(session_id.to_string())
            .or_insert_with(|| StoredDocument::new(session_id));
        document.merge(write);
        let snapshot = document.clone();

        state
            .writes
            .entry(session_id.to_string())
            .or_default()
            .push(write.clone());

        if let Some(tx) = state.channels.get(session_id) {
            // No receivers is fine; the document is still stored
            let _ = tx.send(StoreNotification {
                session_id: session_id.to_string(),
                document: Some(snapshot),
            });
        }

        tracing::debug!(session = %session_id, "Memory document written");
        Ok(())
    }

    async fn read(&self, session_id: &str) -> Result<Option<StoredDocument>> {
        let state = self.state.read().await;
        Ok(state.documents.get(session_id).cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Subscription to one session in a `MemoryStore`
pub struct MemorySubscription {
    session_id: String,
    initial: Option<StoreNotification>,
    stream: BroadcastStream<StoreNotification>,
}

#[async_trait]
impl StoreSubscription for MemorySubscription {
    async fn next(&mut self) -> Result<Option<StoreNotification>> {
        if let Some(initial) = self.initial.take() {
            return Ok(Some(initial));
        }
        loop {
            match self.stream.next().await {
                Some(Ok(notification)) => return Ok(Some(notification)),
                // Every notification is a full snapshot; skipping is safe
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    tracing::warn!(
                        session = %self.session_id,
                        skipped,
                        "Memory subscription lagged"
                    );
                }
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CreativeMode, Message};
    use std::time::Duration;

    async fn next(sub: &mut Box<dyn StoreSubscription>) -> StoreNotification {
        tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_notification_reports_absence() {
        let store = MemoryStore::default();
        let mut sub = store.subscribe("ses-1").await.unwrap();

        let first = next(&mut sub).await;
        assert_eq!(first.session_id, "ses-1");
        assert!(first.document.is_none());
    }

    #[tokio::test]
    async fn test_first_notification_reports_existing_document() {
        let store = MemoryStore::default();
        store
            .write("ses-1", &DocumentWrite::document("draft"))
            .await
            .unwrap();

        let mut sub = store.subscribe("ses-1").await.unwrap();
        let first = next(&mut sub).await;
        assert_eq!(first.document.unwrap().document.as_deref(), Some("draft"));
    }

    #[tokio::test]
    async fn test_writes_are_broadcast_in_order() {
        let store = MemoryStore::default();
        let mut a = store.subscribe("ses-1").await.unwrap();
        let mut b = store.subscribe("ses-1").await.unwrap();
        next(&mut a).await;
        next(&mut b).await;

        store
            .write("ses-1", &DocumentWrite::mode(CreativeMode::Story))
            .await
            .unwrap();
        store
            .write("ses-1", &DocumentWrite::document("chapter one"))
            .await
            .unwrap();

        for sub in [&mut a, &mut b] {
            let first = next(sub).await.document.unwrap();
            assert_eq!(first.mode.as_deref(), Some("STORY"));
            assert!(first.document.is_none());

            let second = next(sub).await.document.unwrap();
            assert_eq!(second.document.as_deref(), Some("chapter one"));
        }
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = MemoryStore::default();
        let mut sub = store.subscribe("ses-1").await.unwrap();
        next(&mut sub).await;

        store
            .write("ses-2", &DocumentWrite::document("other"))
            .await
            .unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(50), sub.next()).await;
        assert!(pending.is_err());
        assert!(store.read("ses-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_log_and_read() {
        let store = MemoryStore::default();
        let message = Message::user("hi", CreativeMode::General);
        store
            .write("ses-1", &DocumentWrite::messages(vec![message.clone()]))
            .await
            .unwrap();
        store
            .write("ses-1", &DocumentWrite::document("doc"))
            .await
            .unwrap();

        let writes = store.writes("ses-1").await;
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].messages, vec![message]);

        let doc = store.read("ses-1").await.unwrap().unwrap();
        assert_eq!(doc.id, "ses-1");
        assert_eq!(doc.messages.len(), 1);
        assert!(store.read("ses-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let store = MemoryStore::default();
        let sub = store.subscribe("ses-1").await.unwrap();
        assert_eq!(store.subscriber_count("ses-1").await, 1);

        drop(sub);
        assert_eq!(store.subscriber_count("ses-1").await, 0);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_skips_to_latest() {
        let store = MemoryStore::new(MemoryConfig {
            channel_capacity: 2,
        });
        let mut sub = store.subscribe("ses-1").await.unwrap();
        next(&mut sub).await;

        for i in 0..5 {
            store
                .write("ses-1", &DocumentWrite::document(format!("v{}", i)))
                .await
                .unwrap();
        }

        let mut last = None;
        while let Ok(Ok(Some(n))) =
            tokio::time::timeout(Duration::from_millis(50), sub.next()).await
        {
            last = n.document.and_then(|d| d.document);
        }
        assert_eq!(last.as_deref(), Some("v4"));
    }

    #[test]
    fn test_store_name() {
        assert_eq!(MemoryStore::default().name(), "memory");
    }
}
