//! Session state container
//!
//! `SessionState` is the single source of truth read by every other
//! component. All mutation goes through [`SessionState::apply`], which runs
//! one [`Transition`] against the current session and publishes the result
//! as a single snapshot, so observers never see a half-applied change.

use crate::document::SessionPatch;
use crate::types::{CreativeMode, Message, Session, SyncStatus};
use tokio::sync::watch;

/// One input event to the session state
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Replace (or clear) the whole session
    Replace(Option<Session>),
    /// Append a message; no-op when its id is already present
    AppendMessage(Message),
    /// Replace a message in place by id, or append it
    UpsertMessage(Message),
    /// Concatenate a chunk onto an existing message's content
    ExtendMessage { id: String, chunk: String },
    /// Drop a message by id
    RemoveMessage(String),
    SetMode(CreativeMode),
    SetTitle(String),
    SetDocument(String),
    /// Merge a normalized remote patch
    ///
    /// Messages in `retain` are local-only (unconfirmed writes, a streaming
    /// placeholder) and survive a remote transcript replacement.
    ApplyRemote {
        patch: SessionPatch,
        retain: Vec<Message>,
    },
}

impl Session {
    /// Apply a transition in place, returning whether anything changed
    pub fn transition(&mut self, transition: Transition) -> bool {
        match transition {
            Transition::Replace(Some(next)) => replace(self, next),
            Transition::Replace(None) => false,
            Transition::AppendMessage(message) => {
                if self.message(&message.id).is_some() {
                    return false;
                }
                self.messages.push(message);
                true
            }
            Transition::UpsertMessage(message) => upsert(&mut self.messages, message),
            Transition::ExtendMessage { id, chunk } => {
                if chunk.is_empty() {
                    return false;
                }
                match self.messages.iter_mut().find(|m| m.id == id) {
                    Some(message) => {
                        message.content.push_str(&chunk);
                        true
                    }
                    None => false,
                }
            }
            Transition::RemoveMessage(id) => {
                let before = self.messages.len();
                self.messages.retain(|m| m.id != id);
                self.messages.len() != before
            }
            Transition::SetMode(mode) => replace(&mut self.mode, mode),
            Transition::SetTitle(title) => replace(&mut self.title, title),
            Transition::SetDocument(text) => replace(&mut self.document, text),
            Transition::ApplyRemote { patch, retain } => {
                let mut changed = false;
                if let Some(title) = patch.title {
                    changed |= replace(&mut self.title, title);
                }
                if let Some(mode) = patch.mode {
                    changed |= replace(&mut self.mode, mode);
                }
                if let Some(document) = patch.document {
                    changed |= replace(&mut self.document, document);
                }
                let transcript = match patch.transcript {
                    Some(transcript) => Some(transcript),
                    None if !retain.is_empty() => Some(self.messages.clone()),
                    None => None,
                };
                if let Some(mut transcript) = transcript {
                    for message in retain {
                        upsert(&mut transcript, message);
                    }
                    changed |= replace(&mut self.messages, transcript);
                }
                changed
            }
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn upsert(messages: &mut Vec<Message>, message: Message) -> bool {
    match messages.iter_mut().find(|m| m.id == message.id) {
        Some(existing) => replace(existing, message),
        None => {
            messages.push(message);
            true
        }
    }
}

/// Observable session state with its sync status
pub struct SessionState {
    session: watch::Sender<Option<Session>>,
    status: watch::Sender<SyncStatus>,
}

impl SessionState {
    /// Create an empty state with no live session
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self { session, status }
    }

    /// Apply one transition atomically
    ///
    /// Observers are notified only when the session actually changed.
    /// Patch transitions are ignored while no session is live.
    pub fn apply(&self, transition: Transition) -> bool {
        self.session.send_if_modified(|current| match transition {
            Transition::Replace(next) => replace(current, next),
            other => match current {
                Some(session) => session.transition(other),
                None => false,
            },
        })
    }

    /// Clone of the current session
    pub fn snapshot(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    /// Read the current session without cloning it
    pub fn read<R>(&self, f: impl FnOnce(Option<&Session>) -> R) -> R {
        f(self.session.borrow().as_ref())
    }

    /// Id of the live session
    pub fn session_id(&self) -> Option<String> {
        self.read(|s| s.map(|s| s.id.clone()))
    }

    /// Subscribe to session snapshots
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub fn set_status(&self, status: SyncStatus) {
        self.status.send_if_modified(|current| replace(current, status));
    }

    /// Subscribe to sync status changes
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_state() -> (SessionState, String) {
        let state = SessionState::new();
        let session = Session::new("Untitled Session");
        let id = session.id.clone();
        state.apply(Transition::Replace(Some(session)));
        (state, id)
    }

    fn remote_patch() -> SessionPatch {
        SessionPatch {
            title: Some("Foxes".to_string()),
            mode: Some(CreativeMode::Story),
            document: Some("Once upon a time".to_string()),
            transcript: Some(vec![Message::user("tell me", CreativeMode::Story)]),
        }
    }

    #[test]
    fn test_new_state_has_no_session() {
        let state = SessionState::new();
        assert!(state.snapshot().is_none());
        assert_eq!(state.status(), SyncStatus::Idle);
        assert!(!state.apply(Transition::SetDocument("x".to_string())));
    }

    #[test]
    fn test_append_is_idempotent() {
        let (state, _) = live_state();
        let message = Message::user("hello", CreativeMode::General);

        assert!(state.apply(Transition::AppendMessage(message.clone())));
        assert!(!state.apply(Transition::AppendMessage(message)));
        assert_eq!(state.snapshot().unwrap().messages.len(), 1);
    }

    #[test]
    fn test_extend_message_in_place() {
        let (state, _) = live_state();
        let placeholder = Message::placeholder(CreativeMode::General);
        let id = placeholder.id.clone();
        state.apply(Transition::AppendMessage(placeholder));

        for chunk in ["Hello", " world", "!"] {
            assert!(state.apply(Transition::ExtendMessage {
                id: id.clone(),
                chunk: chunk.to_string(),
            }));
        }
        assert!(!state.apply(Transition::ExtendMessage {
            id: id.clone(),
            chunk: String::new(),
        }));
        assert!(!state.apply(Transition::ExtendMessage {
            id: "msg-missing".to_string(),
            chunk: "x".to_string(),
        }));

        let session = state.snapshot().unwrap();
        assert_eq!(session.message(&id).unwrap().content, "Hello world!");
    }

    #[test]
    fn test_remove_message() {
        let (state, _) = live_state();
        let message = Message::placeholder(CreativeMode::General);
        let id = message.id.clone();
        state.apply(Transition::AppendMessage(message));

        assert!(state.apply(Transition::RemoveMessage(id.clone())));
        assert!(!state.apply(Transition::RemoveMessage(id)));
        assert!(state.snapshot().unwrap().messages.is_empty());
    }

    #[test]
    fn test_remote_patch_is_idempotent() {
        let (state, _) = live_state();
        let patch = remote_patch();

        assert!(state.apply(Transition::ApplyRemote {
            patch: patch.clone(),
            retain: Vec::new(),
        }));
        let once = state.snapshot().unwrap();

        assert!(!state.apply(Transition::ApplyRemote {
            patch,
            retain: Vec::new(),
        }));
        assert_eq!(state.snapshot().unwrap(), once);
        assert_eq!(once.title, "Foxes");
        assert_eq!(once.mode, CreativeMode::Story);
    }

    #[test]
    fn test_remote_patch_leaves_missing_fields() {
        let (state, _) = live_state();
        state.apply(Transition::SetDocument("local draft".to_string()));

        state.apply(Transition::ApplyRemote {
            patch: SessionPatch {
                mode: Some(CreativeMode::Poetry),
                ..SessionPatch::default()
            },
            retain: Vec::new(),
        });

        let session = state.snapshot().unwrap();
        assert_eq!(session.document, "local draft");
        assert_eq!(session.mode, CreativeMode::Poetry);
    }

    #[test]
    fn test_remote_transcript_keeps_retained_message() {
        let (state, _) = live_state();
        let mut placeholder = Message::placeholder(CreativeMode::General);
        placeholder.content = "partial".to_string();
        state.apply(Transition::AppendMessage(placeholder.clone()));

        let patch = remote_patch();
        state.apply(Transition::ApplyRemote {
            patch: patch.clone(),
            retain: vec![placeholder.clone()],
        });
        assert!(!state.apply(Transition::ApplyRemote {
            patch,
            retain: vec![placeholder.clone()],
        }));

        let session = state.snapshot().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1], placeholder);
    }

    #[test]
    fn test_disjoint_transitions_commute() {
        let mode = Transition::SetMode(CreativeMode::Screenplay);
        let doc = Transition::SetDocument("INT. KITCHEN".to_string());
        let msg = Transition::AppendMessage(Message::user("go", CreativeMode::General));

        let (a, id) = live_state();
        let b = SessionState::new();
        b.apply(Transition::Replace(a.snapshot()));

        a.apply(mode.clone());
        a.apply(doc.clone());
        a.apply(msg.clone());

        b.apply(msg);
        b.apply(doc);
        b.apply(mode);

        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(a.session_id().unwrap(), id);
    }

    #[test]
    fn test_same_field_last_write_wins() {
        let (state, _) = live_state();
        state.apply(Transition::SetDocument("a".to_string()));
        state.apply(Transition::SetDocument("b".to_string()));
        assert_eq!(state.snapshot().unwrap().document, "b");
    }

    #[tokio::test]
    async fn test_observers_see_each_change_once() {
        let (state, _) = live_state();
        let mut rx = state.subscribe();
        rx.borrow_and_update();

        assert!(!state.apply(Transition::SetMode(CreativeMode::General)));
        assert!(!rx.has_changed().unwrap());

        state.apply(Transition::SetMode(CreativeMode::Story));
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().as_ref().unwrap().mode,
            CreativeMode::Story
        );
    }

    #[tokio::test]
    async fn test_status_updates() {
        let state = SessionState::new();
        let mut rx = state.subscribe_status();

        state.set_status(SyncStatus::Syncing);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SyncStatus::Syncing);

        state.set_status(SyncStatus::Syncing);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(state.status(), SyncStatus::Syncing);
    }
}
