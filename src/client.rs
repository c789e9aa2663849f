//! Client handle for the session engine
//!
//! `SessionClient` is the surface the presentation layer talks to. Reads come
//! straight from the shared snapshot; every mutation is forwarded to the
//! engine task and acknowledged once the engine has applied it locally.

use crate::config::SyncConfig;
use crate::engine::{Collaborators, Engine, Request};
use crate::error::{Result, SyncError};
use crate::state::SessionState;
use crate::types::{Attachment, CreativeMode, QualityTier, Session, SyncStatus};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Cloneable handle to a running session engine
///
/// The engine stops when `shutdown` is called or every handle is dropped.
#[derive(Clone)]
pub struct SessionClient {
    requests: mpsc::Sender<Request>,
    state: Arc<SessionState>,
    collaborators: Collaborators,
}

impl SessionClient {
    /// Validate the config and spawn the engine on the current runtime
    pub fn start(config: SyncConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let capacity = config.queue_capacity;
        let (requests_tx, requests_rx) = mpsc::channel(capacity);
        let (signals_tx, signals_rx) = mpsc::channel(capacity);
        let state = Arc::new(SessionState::new());

        let engine = Engine::new(
            Arc::new(config),
            collaborators.clone(),
            state.clone(),
            signals_tx,
        );
        tokio::spawn(engine.run(requests_rx, signals_rx));

        Ok(Self {
            requests: requests_tx,
            state,
            collaborators,
        })
    }

    /// Current session, if one is live
    pub fn snapshot(&self) -> Option<Session> {
        self.state.snapshot()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.state.status()
    }

    /// Watch session snapshots
    pub fn watch_session(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    /// Watch the sync status indicator
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.state.subscribe_status()
    }

    /// Send a prompt and start generating a reply
    ///
    /// Returns once the prompt is in the transcript. The reply arrives
    /// through the session snapshot.
    pub async fn send_message(
        &self,
        content: impl Into<String>,
        attachment: Option<Attachment>,
        quality: Option<QualityTier>,
    ) -> Result<()> {
        let content = content.into();
        self.request(|ack| Request::SendMessage {
            content,
            attachment,
            quality,
            ack,
        })
        .await
    }

    pub async fn switch_mode(&self, mode: CreativeMode) -> Result<()> {
        self.request(|ack| Request::SwitchMode { mode, ack }).await
    }

    /// Replace the shared document; the write is debounced
    pub async fn update_document(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.request(|ack| Request::UpdateDocument { text, ack }).await
    }

    /// Abandon the current session and start a fresh one
    ///
    /// Returns the new session id.
    pub async fn reset(&self) -> Result<String> {
        self.request(|ack| Request::Reset { ack }).await
    }

    /// Attach to an existing shared session
    pub async fn open(&self, session_id: &str) -> Result<()> {
        let document = self
            .collaborators
            .store
            .read(session_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(session_id.to_string()))?;

        self.request(|ack| Request::Open { document, ack }).await
    }

    /// Stop the engine and release the live session
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|ack| Request::Shutdown { ack }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Request,
    ) -> Result<T> {
        let (ack, rx) = oneshot::channel();
        self.requests
            .send(build(ack))
            .await
            .map_err(|_| SyncError::Closed)?;
        rx.await.map_err(|_| SyncError::Closed)?
    }
}
