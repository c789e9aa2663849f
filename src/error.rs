//! Error types for a3s-sync

use thiserror::Error;

/// Errors that can occur in the session synchronization engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// Write-through to the shared store failed
    #[error("Failed to write session '{session_id}': {reason}")]
    Store {
        session_id: String,
        reason: String,
    },

    /// Subscribing to (or reading from) the shared store failed
    #[error("Failed to subscribe to session '{session_id}': {reason}")]
    Subscribe {
        session_id: String,
        reason: String,
    },

    /// Text or image generation failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// An operation needs a live session but none is open
    #[error("No live session")]
    NoSession,

    /// A generation request is already outstanding for the session
    #[error("Session '{0}' is busy generating")]
    Busy(String),

    /// Rejected user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Session not found in the shared store
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The engine task has stopped
    #[error("Session engine is closed")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
