//! Configuration for the sync engine
//!
//! Built programmatically via `SyncConfig::default()` + `with_*` methods, or
//! loaded from a camelCase JSON file with `SyncConfig::from_file()`.

use crate::error::{Result, SyncError};
use crate::types::{CreativeMode, QualityTier};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// When a finished streamed reply also replaces the shared document
///
/// Long replies in document modes are usually a full draft rather than
/// conversation. The threshold is explicit so the behaviour can be tuned or
/// switched off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "policy")]
pub enum DocumentAdoption {
    /// Replies never touch the document
    #[default]
    Never,
    /// Replies of at least `min_chars` characters in a document mode
    #[serde(rename_all = "camelCase")]
    LongResponses { min_chars: usize },
}

impl DocumentAdoption {
    /// Whether a finished reply should become the shared document
    pub fn adopts(&self, mode: CreativeMode, content: &str) -> bool {
        match self {
            DocumentAdoption::Never => false,
            DocumentAdoption::LongResponses { min_chars } => {
                mode.is_document_mode() && content.chars().count() >= *min_chars
            }
        }
    }
}

/// Sync engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Quiet interval before a document edit is written through
    pub debounce_ms: u64,

    /// Number of prior messages sent as generation context
    pub history_turns: usize,

    /// Image quality when the caller gives no hint
    pub default_quality: QualityTier,

    /// Title given to new sessions until the first prompt names them
    pub default_title: String,

    /// Capacity of the engine's request and signal queues
    pub queue_capacity: usize,

    pub document_adoption: DocumentAdoption,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            history_turns: 20,
            default_quality: QualityTier::Standard,
            default_title: "Untitled Session".to_string(),
            queue_capacity: 256,
            document_adoption: DocumentAdoption::Never,
        }
    }
}

impl SyncConfig {
    pub fn with_debounce(mut self, interval: Duration) -> Self {
        self.debounce_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub fn with_default_quality(mut self, quality: QualityTier) -> Self {
        self.default_quality = quality;
        self
    }

    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_document_adoption(mut self, policy: DocumentAdoption) -> Self {
        self.document_adoption = policy;
        self
    }

    /// Debounce interval as a `Duration`
    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(SyncError::Config(
                "debounceMs must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(SyncError::Config(
                "queueCapacity must be greater than zero".to_string(),
            ));
        }
        if self.default_title.trim().is_empty() {
            return Err(SyncError::Config(
                "defaultTitle must not be empty".to_string(),
            ));
        }
        if let DocumentAdoption::LongResponses { min_chars: 0 } = self.document_adoption {
            return Err(SyncError::Config(
                "documentAdoption.minChars must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: SyncConfig = serde_json::from_str(&json).map_err(|e| {
            SyncError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Sync config loaded");
        Ok(config)
    }
}
