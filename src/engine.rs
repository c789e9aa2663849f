//! Session engine: the single owner of session state
//!
//! One task runs the engine. Client requests and internal signals (remote
//! notifications, stream chunks, generation results, write completions,
//! debounce ticks) are multiplexed onto it and handled one at a time, so no
//! two mutations ever interleave. Every signal carries the id of the session
//! it was produced for; signals for a session that is no longer live are
//! dropped.

use crate::accumulator::StreamingAccumulator;
use crate::config::SyncConfig;
use crate::debounce::DocumentPublisher;
use crate::document::{DocumentWrite, SessionPatch, StoredDocument};
use crate::echo::EchoGuard;
use crate::error::{Result, SyncError};
use crate::generation::{
    GeneratedImage, GenerationRequest, ImageGenerator, ImageRequest, TextGenerator,
};
use crate::identity::IdentityProvider;
use crate::listener;
use crate::provider::DocumentStore;
use crate::state::{SessionState, Transition};
use crate::types::{
    derive_title, Attachment, AttachmentRef, CreativeMode, Message, QualityTier, Session,
    SyncStatus,
};
use crate::writer::{Fields, WriteKind, WriteQueue, WriteTicket};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// External collaborators the engine drives
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Requests issued by `SessionClient`
pub(crate) enum Request {
    SendMessage {
        content: String,
        attachment: Option<Attachment>,
        quality: Option<QualityTier>,
        ack: oneshot::Sender<Result<()>>,
    },
    SwitchMode {
        mode: CreativeMode,
        ack: oneshot::Sender<Result<()>>,
    },
    UpdateDocument {
        text: String,
        ack: oneshot::Sender<Result<()>>,
    },
    Reset {
        ack: oneshot::Sender<Result<String>>,
    },
    Open {
        document: StoredDocument,
        ack: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        ack: oneshot::Sender<Result<()>>,
    },
}

/// Signals produced by the engine's own tasks
#[derive(Debug)]
pub(crate) enum Signal {
    RemoteChanged {
        session_id: String,
        document: Option<StoredDocument>,
    },
    RemoteFailed {
        session_id: String,
        error: SyncError,
    },
    /// Result of re-reading the store once held-back fields settled
    Resynced {
        session_id: String,
        epoch: u64,
        result: std::result::Result<Option<StoredDocument>, String>,
    },
    StreamChunk {
        session_id: String,
        message_id: String,
        chunk: String,
    },
    StreamEnded {
        session_id: String,
        message_id: String,
        error: Option<String>,
    },
    ImageFinished {
        session_id: String,
        request_id: String,
        result: std::result::Result<GeneratedImage, String>,
    },
    WriteFinished {
        ticket: WriteTicket,
        result: std::result::Result<(), String>,
    },
    DocumentQuiet {
        session_id: String,
        generation: u64,
    },
}

/// Outstanding generation for the live session
enum Generation {
    Streaming {
        accumulator: StreamingAccumulator,
        pump: JoinHandle<()>,
    },
    Image {
        request_id: String,
        mode: CreativeMode,
        task: JoinHandle<()>,
    },
}

impl Generation {
    fn abort(&self) {
        match self {
            Generation::Streaming { pump, .. } => pump.abort(),
            Generation::Image { task, .. } => task.abort(),
        }
    }
}

/// In-flight writes per scalar field
///
/// A field with a write in flight keeps its local value when a remote
/// snapshot arrives, since that snapshot may predate the write.
#[derive(Debug, Default)]
struct PendingFields {
    title: usize,
    mode: usize,
    document: usize,
}

impl PendingFields {
    fn add(&mut self, fields: Fields) {
        self.title += usize::from(fields.title);
        self.mode += usize::from(fields.mode);
        self.document += usize::from(fields.document);
    }

    fn release(&mut self, fields: Fields) {
        self.title = self.title.saturating_sub(usize::from(fields.title));
        self.mode = self.mode.saturating_sub(usize::from(fields.mode));
        self.document = self.document.saturating_sub(usize::from(fields.document));
    }
}

/// Resources keyed on the live session id
struct LiveSession {
    id: String,
    seeded: bool,
    guard: Arc<EchoGuard>,
    listener: JoinHandle<()>,
    writer: WriteQueue,
    publisher: DocumentPublisher,
    generation: Option<Generation>,
    /// Messages written locally whose write has not succeeded yet
    unconfirmed: HashSet<String>,
    pending_fields: PendingFields,
    pending_writes: usize,
    /// A differing remote value was held back; the store must be read again
    stale: bool,
    /// Bumped whenever a remote snapshot is applied
    remote_epoch: u64,
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.listener.abort();
        if let Some(ref generation) = self.generation {
            generation.abort();
        }
    }
}

pub(crate) struct Engine {
    config: Arc<SyncConfig>,
    collaborators: Collaborators,
    state: Arc<SessionState>,
    live: Option<LiveSession>,
    signals: mpsc::Sender<Signal>,
}

impl Engine {
    pub(crate) fn new(
        config: Arc<SyncConfig>,
        collaborators: Collaborators,
        state: Arc<SessionState>,
        signals: mpsc::Sender<Signal>,
    ) -> Self {
        Self {
            config,
            collaborators,
            state,
            live: None,
            signals,
        }
    }

    /// Process requests and signals until shutdown or every client is gone
    pub(crate) async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        mut signals: mpsc::Receiver<Signal>,
    ) {
        tracing::info!(store = self.collaborators.store.name(), "Session engine started");

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request::Shutdown { ack }) => {
                        self.close_live();
                        let _ = ack.send(Ok(()));
                        break;
                    }
                    Some(request) => self.handle_request(request),
                    None => {
                        self.close_live();
                        break;
                    }
                },
                Some(signal) = signals.recv() => self.handle_signal(signal),
            }
        }

        tracing::info!("Session engine stopped");
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::SendMessage {
                content,
                attachment,
                quality,
                ack,
            } => {
                let _ = ack.send(self.send_message(content, attachment, quality));
            }
            Request::SwitchMode { mode, ack } => {
                let _ = ack.send(self.switch_mode(mode));
            }
            Request::UpdateDocument { text, ack } => {
                let _ = ack.send(self.update_document(text));
            }
            Request::Reset { ack } => {
                let _ = ack.send(Ok(self.reset()));
            }
            Request::Open { document, ack } => {
                self.open(document);
                let _ = ack.send(Ok(()));
            }
            Request::Shutdown { ack } => {
                let _ = ack.send(Ok(()));
            }
        }
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::RemoteChanged {
                session_id,
                document,
            } => self.on_remote_changed(session_id, document),
            Signal::RemoteFailed { session_id, error } => {
                if !self.is_live(&session_id) {
                    return;
                }
                tracing::warn!(session = %session_id, error = %error, "Remote subscription failed");
                self.state.set_status(SyncStatus::Idle);
            }
            Signal::Resynced {
                session_id,
                epoch,
                result,
            } => self.on_resynced(&session_id, epoch, result),
            Signal::StreamChunk {
                session_id,
                message_id,
                chunk,
            } => self.on_stream_chunk(&session_id, &message_id, &chunk),
            Signal::StreamEnded {
                session_id,
                message_id,
                error,
            } => self.on_stream_ended(&session_id, &message_id, error),
            Signal::ImageFinished {
                session_id,
                request_id,
                result,
            } => self.on_image_finished(&session_id, &request_id, result),
            Signal::WriteFinished { ticket, result } => self.on_write_finished(ticket, result),
            Signal::DocumentQuiet {
                session_id,
                generation,
            } => self.on_document_quiet(&session_id, generation),
        }
    }

    // ========================================================================
    // Local mutations
    // ========================================================================

    fn send_message(
        &mut self,
        content: String,
        attachment: Option<Attachment>,
        quality: Option<QualityTier>,
    ) -> Result<()> {
        let session = self.state.snapshot().ok_or(SyncError::NoSession)?;
        let live = self.live.as_ref().ok_or(SyncError::NoSession)?;
        if live.generation.is_some() {
            return Err(SyncError::Busy(live.id.clone()));
        }
        let prompt = content.trim().to_string();
        if prompt.is_empty() && attachment.is_none() {
            return Err(SyncError::InvalidInput("message is empty".to_string()));
        }

        let mode = session.mode;
        let message = Message::user(prompt.clone(), mode)
            .with_attachment(attachment.as_ref().map(AttachmentRef::from));
        let mut write = DocumentWrite::messages(vec![message.clone()]);
        self.state.apply(Transition::AppendMessage(message));

        if session.title == self.config.default_title && !session.has_user_messages() {
            if let Some(title) = derive_title(&prompt) {
                self.state.apply(Transition::SetTitle(title.clone()));
                write = write.with_title(title);
            }
        }
        self.write_through(WriteKind::Messages, write);

        let generation = if mode.produces_image() || attachment.is_some() {
            let request = ImageRequest {
                prompt,
                reference: attachment,
                quality: quality.unwrap_or(self.config.default_quality),
            };
            self.spawn_image(session.id.clone(), mode, request)
        } else {
            let request = GenerationRequest {
                prompt,
                mode,
                prior_turns: session.recent_turns(self.config.history_turns),
                document: session.document.clone(),
            };
            self.spawn_stream(session.id.clone(), request)
        };
        if let Some(live) = self.live.as_mut() {
            live.generation = Some(generation);
        }

        tracing::info!(session = %session.id, mode = %mode, "Message sent");
        Ok(())
    }

    fn switch_mode(&mut self, mode: CreativeMode) -> Result<()> {
        if self.live.is_none() {
            return Err(SyncError::NoSession);
        }
        if self.state.apply(Transition::SetMode(mode)) {
            self.write_through(WriteKind::Mode, DocumentWrite::mode(mode));
            tracing::debug!(mode = %mode, "Mode switched");
        }
        Ok(())
    }

    fn update_document(&mut self, text: String) -> Result<()> {
        let live = self.live.as_mut().ok_or(SyncError::NoSession)?;
        self.state.apply(Transition::SetDocument(text));

        let session_id = live.id.clone();
        live.publisher
            .schedule(self.signals.clone(), move |generation| Signal::DocumentQuiet {
                session_id,
                generation,
            });
        Ok(())
    }

    fn reset(&mut self) -> String {
        self.close_live();

        let session = Session::new(self.config.default_title.clone());
        let id = session.id.clone();
        self.state.apply(Transition::Replace(Some(session)));
        self.state.set_status(SyncStatus::Idle);
        self.live = Some(self.attach(id.clone(), false));

        tracing::info!(session = %id, "Session reset");
        id
    }

    fn open(&mut self, document: StoredDocument) {
        self.close_live();

        let session = document.to_session(&self.config.default_title);
        let id = session.id.clone();
        self.state.apply(Transition::Replace(Some(session)));
        self.state.set_status(SyncStatus::Idle);
        self.live = Some(self.attach(id.clone(), true));

        tracing::info!(session = %id, "Session opened");
    }

    fn attach(&self, id: String, seeded: bool) -> LiveSession {
        let guard = Arc::new(EchoGuard::new());
        let store = self.collaborators.store.clone();
        LiveSession {
            listener: listener::spawn(store.clone(), id.clone(), self.signals.clone()),
            writer: WriteQueue::spawn(id.clone(), store, guard.clone(), self.signals.clone()),
            publisher: DocumentPublisher::new(self.config.quiet_interval()),
            id,
            seeded,
            guard,
            generation: None,
            unconfirmed: HashSet::new(),
            pending_fields: PendingFields::default(),
            pending_writes: 0,
            stale: false,
            remote_epoch: 0,
        }
    }

    /// Tear down the live session: subscription, timer and generation
    ///
    /// Writes already queued still reach the store; the old session keeps
    /// existing remotely.
    fn close_live(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        live.publisher.cancel();
        if let Some(generation) = live.generation.take() {
            generation.abort();
            if let Generation::Streaming {
                mut accumulator, ..
            } = generation
            {
                if let Some(removal) = accumulator.cancel() {
                    self.state.apply(removal);
                }
                tracing::debug!(
                    session = %live.id,
                    message = %accumulator.message_id(),
                    "Stream abandoned"
                );
            }
        }
    }

    fn write_through(&mut self, kind: WriteKind, write: DocumentWrite) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        let ticket = WriteTicket {
            session_id: live.id.clone(),
            kind,
            messages: write.messages.iter().map(|m| m.id.clone()).collect(),
            fields: Fields::of(&write),
        };
        let fields = ticket.fields;
        live.unconfirmed.extend(ticket.messages.iter().cloned());

        if live.writer.enqueue(ticket, write) {
            live.pending_writes += 1;
            live.pending_fields.add(fields);
            self.state.set_status(SyncStatus::Syncing);
        } else {
            tracing::warn!(session = %live.id, "Writer stopped, write dropped");
            self.state.set_status(SyncStatus::Idle);
        }
    }

    // ========================================================================
    // Generation
    // ========================================================================

    fn spawn_stream(&self, session_id: String, request: GenerationRequest) -> Generation {
        let accumulator = StreamingAccumulator::new(session_id.clone(), request.mode);
        let message_id = accumulator.message_id().to_string();
        let text = self.collaborators.text.clone();
        let signals = self.signals.clone();

        let pump = tokio::spawn(async move {
            let error = match text.stream(request).await {
                Ok(mut stream) => {
                    let mut error = None;
                    while let Some(item) = stream.next().await {
                        match item {
                            Ok(chunk) => {
                                let signal = Signal::StreamChunk {
                                    session_id: session_id.clone(),
                                    message_id: message_id.clone(),
                                    chunk,
                                };
                                if signals.send(signal).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                error = Some(failure_reason(&e));
                                break;
                            }
                        }
                    }
                    error
                }
                Err(e) => Some(failure_reason(&e)),
            };
            let _ = signals
                .send(Signal::StreamEnded {
                    session_id,
                    message_id,
                    error,
                })
                .await;
        });

        Generation::Streaming { accumulator, pump }
    }

    fn spawn_image(
        &self,
        session_id: String,
        mode: CreativeMode,
        request: ImageRequest,
    ) -> Generation {
        let request_id = uuid::Uuid::new_v4().to_string();
        let image = self.collaborators.image.clone();
        let signals = self.signals.clone();
        let id = request_id.clone();

        let task = tokio::spawn(async move {
            let result = match image.generate(request).await {
                Ok(generated) if generated.image.is_empty() => {
                    Err("image generator returned no image".to_string())
                }
                Ok(generated) => Ok(generated),
                Err(e) => Err(failure_reason(&e)),
            };
            let _ = signals
                .send(Signal::ImageFinished {
                    session_id,
                    request_id: id,
                    result,
                })
                .await;
        });

        Generation::Image {
            request_id,
            mode,
            task,
        }
    }

    fn on_stream_chunk(&mut self, session_id: &str, message_id: &str, chunk: &str) {
        let Some(accumulator) = self.accumulator_mut(session_id, message_id) else {
            tracing::debug!(session = %session_id, message = %message_id, "Stale chunk dropped");
            return;
        };
        for step in accumulator.push(chunk) {
            self.state.apply(step);
        }
    }

    fn on_stream_ended(&mut self, session_id: &str, message_id: &str, error: Option<String>) {
        let Some(accumulator) = self.accumulator_mut(session_id, message_id) else {
            tracing::debug!(
                session = %session_id,
                message = %message_id,
                "Stale stream end dropped"
            );
            return;
        };
        let mode = accumulator.mode();

        let Some(message) = accumulator.finish() else {
            // Nothing streamed: no placeholder exists, report the failure
            if let Some(live) = self.live.as_mut() {
                live.generation = None;
            }
            let reason = error.as_deref().unwrap_or("empty response");
            tracing::warn!(session = %session_id, error = %reason, "Stream produced no content");
            let failure = Message::generation_failure(reason, mode);
            self.state.apply(Transition::AppendMessage(failure.clone()));
            self.write_through(WriteKind::Messages, DocumentWrite::messages(vec![failure]));
            return;
        };

        self.state.apply(Transition::UpsertMessage(message.clone()));
        let content = message.content.clone();
        let mut write = DocumentWrite::messages(vec![message]);

        match error {
            Some(reason) => {
                tracing::warn!(session = %session_id, error = %reason, "Stream ended with error");
                let failure = Message::generation_failure(&reason, mode);
                self.state.apply(Transition::AppendMessage(failure.clone()));
                write = write.with_message(failure);
            }
            None if self.config.document_adoption.adopts(mode, &content) => {
                self.state.apply(Transition::SetDocument(content.clone()));
                write = write.with_document(content);
                if let Some(live) = self.live.as_mut() {
                    live.publisher.cancel();
                }
                tracing::debug!(session = %session_id, "Reply adopted as document");
            }
            None => {}
        }

        self.write_through(
            WriteKind::StreamFinal {
                message_id: message_id.to_string(),
            },
            write,
        );
    }

    fn on_image_finished(
        &mut self,
        session_id: &str,
        request_id: &str,
        result: std::result::Result<GeneratedImage, String>,
    ) {
        let Some(live) = self.live.as_mut().filter(|l| l.id == session_id) else {
            tracing::debug!(session = %session_id, "Stale image result dropped");
            return;
        };
        let mode = match live.generation {
            Some(Generation::Image {
                request_id: ref current,
                mode,
                ..
            }) if current == request_id => mode,
            _ => {
                tracing::debug!(session = %session_id, "Unexpected image result dropped");
                return;
            }
        };
        live.generation = None;

        let message = match result {
            Ok(generated) => {
                Message::assistant(generated.commentary, mode).with_image(generated.image)
            }
            Err(reason) => {
                tracing::warn!(session = %session_id, error = %reason, "Image generation failed");
                Message::generation_failure(&reason, mode)
            }
        };
        self.state.apply(Transition::AppendMessage(message.clone()));
        self.write_through(WriteKind::Messages, DocumentWrite::messages(vec![message]));
    }

    fn accumulator_mut(
        &mut self,
        session_id: &str,
        message_id: &str,
    ) -> Option<&mut StreamingAccumulator> {
        let live = self.live.as_mut().filter(|l| l.id == session_id)?;
        match live.generation {
            Some(Generation::Streaming {
                ref mut accumulator,
                ..
            }) if accumulator.message_id() == message_id => Some(accumulator),
            _ => None,
        }
    }

    // ========================================================================
    // Remote updates and write completion
    // ========================================================================

    fn on_remote_changed(&mut self, session_id: String, document: Option<StoredDocument>) {
        let user_id = self.collaborators.identity.user_id();
        let Some(live) = self.live.as_mut().filter(|l| l.id == session_id) else {
            tracing::debug!(session = %session_id, "Notification for inactive session dropped");
            return;
        };

        let first = !live.seeded;
        live.seeded = true;
        let Some(document) = document else {
            if first {
                self.seed(&session_id, user_id);
            } else {
                tracing::debug!(session = %session_id, "Remote document missing");
            }
            return;
        };

        // Our own early writes created the document before the subscription
        // reported; it still lacks what only the seed carries
        if first && document.owner.is_none() {
            self.seed(&session_id, user_id);
            return;
        }

        if live.guard.consume() {
            tracing::debug!(session = %session_id, "Echo suppressed");
            return;
        }

        live.remote_epoch += 1;
        self.apply_remote(&session_id, &document);
    }

    fn seed(&mut self, session_id: &str, owner: String) {
        let Some(seed) = self.state.read(|s| s.map(|s| DocumentWrite::seed(s, owner))) else {
            return;
        };
        tracing::info!(session = %session_id, "Seeding remote session");
        self.write_through(WriteKind::Seed, seed);
    }

    /// Merge a remote snapshot, keeping what local writes have not confirmed
    fn apply_remote(&mut self, session_id: &str, document: &StoredDocument) {
        let Some(live) = self.live.as_mut() else {
            return;
        };

        let mut keep: HashSet<String> = live.unconfirmed.clone();
        if let Some(Generation::Streaming {
            ref accumulator, ..
        }) = live.generation
        {
            if accumulator.has_placeholder() {
                keep.insert(accumulator.message_id().to_string());
            }
        }

        let mut patch = listener::normalize(document);
        let (retain, held_back): (Vec<Message>, bool) = self.state.read(|s| match s {
            Some(s) => {
                let retain = s
                    .messages
                    .iter()
                    .filter(|m| keep.contains(&m.id))
                    .cloned()
                    .collect();
                (retain, hold_pending(live, s, &mut patch))
            }
            None => (Vec::new(), false),
        });
        if held_back {
            tracing::debug!(session = %session_id, "Remote value held until local writes settle");
        }
        live.stale |= held_back;
        let settled = live.pending_writes == 0 && !live.stale;

        if self.state.apply(Transition::ApplyRemote { patch, retain }) {
            tracing::debug!(session = %session_id, "Remote change applied");
        }
        if settled {
            self.state.set_status(SyncStatus::Synced);
        }
    }

    /// Read the store again so held-back remote values are not lost
    fn resync(&mut self) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        live.stale = false;
        let session_id = live.id.clone();
        let epoch = live.remote_epoch;
        let store = self.collaborators.store.clone();
        let signals = self.signals.clone();

        tracing::debug!(session = %session_id, epoch, "Resyncing with remote store");
        tokio::spawn(async move {
            let result = store.read(&session_id).await.map_err(|e| e.to_string());
            let _ = signals
                .send(Signal::Resynced {
                    session_id,
                    epoch,
                    result,
                })
                .await;
        });
    }

    fn on_resynced(
        &mut self,
        session_id: &str,
        epoch: u64,
        result: std::result::Result<Option<StoredDocument>, String>,
    ) {
        let Some(live) = self.live.as_mut().filter(|l| l.id == session_id) else {
            return;
        };
        if live.remote_epoch != epoch {
            // A notification applied since the read was issued is at least as new
            tracing::debug!(session = %session_id, epoch, "Superseded resync dropped");
            return;
        }

        match result {
            Ok(Some(document)) => {
                live.remote_epoch += 1;
                self.apply_remote(session_id, &document);
            }
            Ok(None) => tracing::debug!(session = %session_id, "Remote document missing"),
            Err(reason) => {
                tracing::warn!(session = %session_id, error = %reason, "Resync read failed");
                self.state.set_status(SyncStatus::Idle);
            }
        }
    }

    fn on_write_finished(&mut self, ticket: WriteTicket, result: std::result::Result<(), String>) {
        let Some(live) = self.live.as_mut().filter(|l| l.id == ticket.session_id) else {
            tracing::debug!(
                session = %ticket.session_id,
                "Completion for inactive session dropped"
            );
            return;
        };
        live.pending_writes = live.pending_writes.saturating_sub(1);
        live.pending_fields.release(ticket.fields);
        if result.is_ok() {
            for id in &ticket.messages {
                live.unconfirmed.remove(id);
            }
        }

        if let WriteKind::StreamFinal { ref message_id } = ticket.kind {
            let finished = match live.generation {
                Some(Generation::Streaming {
                    ref mut accumulator,
                    ..
                }) if accumulator.message_id() == message_id => {
                    accumulator.complete();
                    true
                }
                _ => false,
            };
            if finished {
                live.generation = None;
                tracing::debug!(session = %live.id, message = %message_id, "Stream finalized");
            }
        }

        let drained = live.pending_writes == 0;
        let resync = drained && live.stale && !live.publisher.is_pending();
        match result {
            Err(_) => self.state.set_status(SyncStatus::Idle),
            Ok(()) if drained && !live.stale => self.state.set_status(SyncStatus::Synced),
            Ok(()) => {}
        }
        if resync {
            self.resync();
        }
    }

    fn on_document_quiet(&mut self, session_id: &str, generation: u64) {
        let Some(live) = self.live.as_mut().filter(|l| l.id == session_id) else {
            return;
        };
        if !live.publisher.take_if_current(generation) {
            tracing::debug!(session = %session_id, generation, "Stale document tick dropped");
            return;
        }
        let Some(text) = self.state.read(|s| s.map(|s| s.document.clone())) else {
            return;
        };
        self.write_through(WriteKind::Document, DocumentWrite::document(text));
    }

    fn is_live(&self, session_id: &str) -> bool {
        self.live.as_ref().is_some_and(|l| l.id == session_id)
    }
}

/// Drop patch fields that a local write still has in flight
///
/// Returns whether a dropped value differed from the local one.
fn hold_pending(live: &LiveSession, session: &Session, patch: &mut SessionPatch) -> bool {
    let held = &live.pending_fields;
    let mut differs = false;
    if held.title > 0 {
        differs |= patch.title.take().is_some_and(|t| t != session.title);
    }
    if held.mode > 0 {
        differs |= patch.mode.take().is_some_and(|m| m != session.mode);
    }
    if held.document > 0 || live.publisher.is_pending() {
        differs |= patch.document.take().is_some_and(|d| d != session.document);
    }
    differs
}

/// Human-readable reason for a collaborator failure
fn failure_reason(error: &SyncError) -> String {
    match error {
        SyncError::Generation(reason) => reason.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_unwraps_generation_errors() {
        let reason = failure_reason(&SyncError::Generation("quota exceeded".to_string()));
        assert_eq!(reason, "quota exceeded");

        let reason = failure_reason(&SyncError::Closed);
        assert_eq!(reason, "Session engine is closed");
    }

    #[test]
    fn test_pending_fields_balance() {
        let mut pending = PendingFields::default();
        let write = DocumentWrite::document("draft").with_title("T");
        pending.add(Fields::of(&write));
        pending.add(Fields::of(&DocumentWrite::document("again")));
        assert_eq!((pending.title, pending.mode, pending.document), (1, 0, 2));

        pending.release(Fields::of(&write));
        pending.release(Fields::of(&write));
        assert_eq!((pending.title, pending.mode, pending.document), (0, 0, 0));
    }
}
