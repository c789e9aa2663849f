//! Generative backend seams
//!
//! The backend is opaque: text arrives as a finite stream of increments,
//! images as a single result. Implementations live outside this crate.

use crate::error::Result;
use crate::types::{Attachment, CreativeMode, QualityTier, Turn};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Finite, non-restartable sequence of text increments
pub type TextStream = BoxStream<'static, Result<String>>;

/// Request for a streamed text reply
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// The user's prompt
    pub prompt: String,

    /// Mode the prompt was sent in
    pub mode: CreativeMode,

    /// Conversation before the prompt, oldest first
    pub prior_turns: Vec<Turn>,

    /// Shared document at the time of the request
    pub document: String,
}

/// Request for a generated image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,

    /// Reference image to edit or draw from
    pub reference: Option<Attachment>,

    pub quality: QualityTier,
}

/// Result of an image generation
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    /// Reference to the produced image (URL or data URI)
    pub image: String,

    /// Text the backend returned alongside the image
    pub commentary: String,
}

/// Streaming text generator
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Start generating; the returned stream yields increments until done
    async fn stream(&self, request: GenerationRequest) -> Result<TextStream>;
}

/// Image generator
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: ImageRequest) -> Result<GeneratedImage>;
}
