//! Wire model of the shared document store
//!
//! A `StoredDocument` is what the store holds for one session. Writes are
//! partial: scalar fields are last-write-wins, messages are upserted by id.

use crate::types::{CreativeMode, Message, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A session as persisted by the shared store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    /// Session identifier
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// User id of the participant who created the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Raw mode string; may hold values this client does not know
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,

    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoredDocument {
    /// Create an empty document for a session id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Merge a partial write into this document
    pub fn merge(&mut self, write: &DocumentWrite) {
        if let Some(ref title) = write.title {
            self.title = Some(title.clone());
        }
        if let Some(ref owner) = write.owner {
            self.owner = Some(owner.clone());
        }
        if let Some(mode) = write.mode {
            self.mode = Some(mode.as_str().to_string());
        }
        if let Some(ref document) = write.document {
            self.document = Some(document.clone());
        }
        if write.created_at.is_some() && self.created_at.is_none() {
            self.created_at = write.created_at;
        }
        for message in &write.messages {
            match self.messages.iter_mut().find(|m| m.id == message.id) {
                Some(existing) => *existing = message.clone(),
                None => self.messages.push(message.clone()),
            }
        }
        self.updated_at = Some(Utc::now());
    }

    /// Build the local session this document describes
    ///
    /// Unknown modes fall back to the default mode.
    pub fn to_session(&self, default_title: &str) -> Session {
        let mut session = Session::with_id(
            self.id.clone(),
            self.title.clone().unwrap_or_else(|| default_title.to_string()),
        );
        session.mode = self
            .mode
            .as_deref()
            .and_then(|m| m.parse().ok())
            .unwrap_or_default();
        session.document = self.document.clone().unwrap_or_default();
        session.messages = self.messages.clone();
        if let Some(created_at) = self.created_at {
            session.created_at = created_at;
        }
        session
    }
}

/// A partial write to a stored document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentWrite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<CreativeMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,

    /// Messages to upsert by id
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl DocumentWrite {
    /// Full write of a session, used to seed the store
    pub fn seed(session: &Session, owner: impl Into<String>) -> Self {
        Self {
            title: Some(session.title.clone()),
            owner: Some(owner.into()),
            mode: Some(session.mode),
            document: Some(session.document.clone()),
            messages: session.messages.clone(),
            created_at: Some(session.created_at),
        }
    }

    /// Upsert a set of messages
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn mode(mode: CreativeMode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }

    pub fn document(text: impl Into<String>) -> Self {
        Self {
            document: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_document(mut self, text: impl Into<String>) -> Self {
        self.document = Some(text.into());
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }
}

/// A change notification delivered by a store subscription
#[derive(Debug, Clone, PartialEq)]
pub struct StoreNotification {
    /// Session the notification is about
    pub session_id: String,

    /// Current document, `None` when the session does not exist remotely
    pub document: Option<StoredDocument>,
}

/// Normalized remote change to apply to a session
///
/// `None` fields leave the local value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub mode: Option<CreativeMode>,
    pub document: Option<String>,
    pub transcript: Option<Vec<Message>>,
}
