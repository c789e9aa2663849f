//! Core session types for the a3s-sync system
//!
//! All types use camelCase JSON serialization for wire compatibility
//! with the shared document store.

use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of characters kept when deriving a title from a prompt
const TITLE_MAX_CHARS: usize = 48;

/// One collaborative creative session
///
/// The transcript is append-only from the perspective of a single client,
/// but a remote snapshot may replace it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier (ses-<uuid>)
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Creative mode currently active
    #[serde(default)]
    pub mode: CreativeMode,

    /// Shared document text
    #[serde(default)]
    pub document: String,

    /// Ordered transcript
    #[serde(default)]
    pub messages: Vec<Message>,

    /// When the session was created
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a new empty session with a fresh identifier
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(format!("ses-{}", uuid::Uuid::new_v4()), title)
    }

    /// Create an empty session for a known identifier
    pub fn with_id(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            mode: CreativeMode::default(),
            document: String::new(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Look up a message by id
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Whether any message from the user has been recorded yet
    pub fn has_user_messages(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    /// The last `limit` messages as generation context
    ///
    /// Image-only messages carry no text and are skipped.
    pub fn recent_turns(&self, limit: usize) -> Vec<Turn> {
        let turns: Vec<Turn> = self
            .messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| Turn {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();
        let skip = turns.len().saturating_sub(limit);
        turns.into_iter().skip(skip).collect()
    }
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier (msg-<uuid>)
    pub id: String,

    /// Author role
    pub role: Role,

    /// Text content; grows in place while an assistant reply streams
    pub content: String,

    /// Mode active when the message was produced
    #[serde(default)]
    pub mode: CreativeMode,

    /// When the message was created
    pub created_at: DateTime<Utc>,

    /// Generated image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// User-supplied attachment reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>, mode: CreativeMode) -> Self {
        Self {
            id: format!("msg-{}", uuid::Uuid::new_v4()),
            role,
            content: content.into(),
            mode,
            created_at: Utc::now(),
            image: None,
            attachment: None,
        }
    }

    /// A message authored by the human participant
    pub fn user(content: impl Into<String>, mode: CreativeMode) -> Self {
        Self::new(Role::User, content, mode)
    }

    /// A message authored by the generative backend
    pub fn assistant(content: impl Into<String>, mode: CreativeMode) -> Self {
        Self::new(Role::Assistant, content, mode)
    }

    /// An empty assistant message that streamed content grows into
    pub fn placeholder(mode: CreativeMode) -> Self {
        Self::assistant(String::new(), mode)
    }

    /// A visible assistant message describing a generation failure
    pub fn generation_failure(reason: &str, mode: CreativeMode) -> Self {
        Self::assistant(format!("Generation failed: {}", reason), mode)
    }

    /// Attach a generated image reference
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Attach a user-supplied attachment reference
    pub fn with_attachment(mut self, attachment: Option<AttachmentRef>) -> Self {
        self.attachment = attachment;
        self
    }
}

/// A prior conversation turn passed to the generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Creative mode of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreativeMode {
    #[default]
    General,
    Story,
    Poetry,
    Screenplay,
    ImagePrompt,
}

impl CreativeMode {
    /// Wire name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            CreativeMode::General => "GENERAL",
            CreativeMode::Story => "STORY",
            CreativeMode::Poetry => "POETRY",
            CreativeMode::Screenplay => "SCREENPLAY",
            CreativeMode::ImagePrompt => "IMAGE_PROMPT",
        }
    }

    /// Whether messages in this mode are answered with an image
    pub fn produces_image(&self) -> bool {
        matches!(self, CreativeMode::ImagePrompt)
    }

    /// Whether long responses in this mode may become the shared document
    pub fn is_document_mode(&self) -> bool {
        matches!(
            self,
            CreativeMode::Story | CreativeMode::Poetry | CreativeMode::Screenplay
        )
    }
}

impl fmt::Display for CreativeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreativeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GENERAL" => Ok(CreativeMode::General),
            "STORY" => Ok(CreativeMode::Story),
            "POETRY" => Ok(CreativeMode::Poetry),
            "SCREENPLAY" => Ok(CreativeMode::Screenplay),
            "IMAGE_PROMPT" => Ok(CreativeMode::ImagePrompt),
            other => Err(format!("unknown creative mode '{}'", other)),
        }
    }
}

/// Outcome of the most recent outbound write-through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Synced,
}

/// Image quality tier requested from the image generator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    #[default]
    Standard,
    High,
}

/// User-supplied file sent along with a message
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// MIME type (e.g., "image/png")
    pub mime_type: String,

    /// Raw file content
    pub data: Bytes,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Encode as a `data:` URI
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// Persisted reference to an attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub mime_type: String,
    pub uri: String,
}

impl From<&Attachment> for AttachmentRef {
    fn from(attachment: &Attachment) -> Self {
        Self {
            mime_type: attachment.mime_type.clone(),
            uri: attachment.to_data_uri(),
        }
    }
}

/// Derive a session title from the first line of a prompt
///
/// Returns `None` when the prompt has no usable text.
pub fn derive_title(content: &str) -> Option<String> {
    let line = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    if line.chars().count() <= TITLE_MAX_CHARS {
        return Some(line.to_string());
    }
    let truncated: String = line.chars().take(TITLE_MAX_CHARS).collect();
    Some(format!("{}…", truncated.trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = Session::new("Untitled Session");
        assert!(session.id.starts_with("ses-"));
        assert_eq!(session.title, "Untitled Session");
        assert_eq!(session.mode, CreativeMode::General);
        assert!(session.document.is_empty());
        assert!(session.messages.is_empty());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = Session::new("a");
        let b = Session::new("b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_message_constructors() {
        let user = Message::user("Write a haiku", CreativeMode::Poetry);
        assert!(user.id.starts_with("msg-"));
        assert_eq!(user.role, Role::User);
        assert_eq!(user.mode, CreativeMode::Poetry);

        let placeholder = Message::placeholder(CreativeMode::General);
        assert_eq!(placeholder.role, Role::Assistant);
        assert!(placeholder.content.is_empty());

        let failure = Message::generation_failure("quota exceeded", CreativeMode::General);
        assert_eq!(failure.role, Role::Assistant);
        assert_eq!(failure.content, "Generation failed: quota exceeded");
    }

    #[test]
    fn test_message_serialization_roundtrip() {
        let message = Message::assistant("A fox", CreativeMode::ImagePrompt)
            .with_image("https://images.example/fox.png");

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
        assert!(json.contains("\"mode\":\"IMAGE_PROMPT\""));
        assert!(json.contains("\"createdAt\""));
        assert!(!json.contains("attachment"));

        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_message_backward_compat_without_mode() {
        let json = r#"{
            "id": "msg-1",
            "role": "user",
            "content": "hi",
            "createdAt": "2024-01-01T00:00:00Z"
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.mode, CreativeMode::General);
        assert!(message.image.is_none());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("GENERAL".parse::<CreativeMode>().unwrap(), CreativeMode::General);
        assert_eq!(
            "image_prompt".parse::<CreativeMode>().unwrap(),
            CreativeMode::ImagePrompt
        );
        assert!("DANCE".parse::<CreativeMode>().is_err());
    }

    #[test]
    fn test_mode_display_matches_wire_format() {
        for mode in [
            CreativeMode::General,
            CreativeMode::Story,
            CreativeMode::Poetry,
            CreativeMode::Screenplay,
            CreativeMode::ImagePrompt,
        ] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode));
            assert_eq!(mode.to_string().parse::<CreativeMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_mode_classification() {
        assert!(CreativeMode::ImagePrompt.produces_image());
        assert!(!CreativeMode::General.produces_image());
        assert!(CreativeMode::Story.is_document_mode());
        assert!(!CreativeMode::General.is_document_mode());
        assert!(!CreativeMode::ImagePrompt.is_document_mode());
    }

    #[test]
    fn test_recent_turns_limit_and_order() {
        let mut session = Session::new("t");
        for i in 0..5 {
            session
                .messages
                .push(Message::user(format!("q{}", i), CreativeMode::General));
        }
        session
            .messages
            .push(Message::assistant("", CreativeMode::ImagePrompt).with_image("img"));

        let turns = session.recent_turns(3);
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn test_attachment_data_uri() {
        let attachment = Attachment::new("image/png", vec![0x89u8, b'P', b'N', b'G']);
        assert_eq!(attachment.to_data_uri(), "data:image/png;base64,iVBORw==");

        let reference = AttachmentRef::from(&attachment);
        assert_eq!(reference.mime_type, "image/png");
        assert!(reference.uri.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("Write a haiku"), Some("Write a haiku".to_string()));
        assert_eq!(derive_title("\n   \n  second line \n"), Some("second line".to_string()));
        assert_eq!(derive_title("   "), None);

        let long = "a".repeat(100);
        let title = derive_title(&long).unwrap();
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 1);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_sync_status_default() {
        assert_eq!(SyncStatus::default(), SyncStatus::Idle);
        assert_eq!(serde_json::to_string(&SyncStatus::Synced).unwrap(), "\"synced\"");
    }
}
