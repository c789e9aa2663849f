//! # a3s-sync
//!
//! Real-time synchronization of collaborative creative sessions for the A3S
//! ecosystem.
//!
//! ## Overview
//!
//! `a3s-sync` keeps one local creative session (a conversation transcript, a
//! creative mode and a shared document) consistent with a shared document
//! store while a generative backend streams replies into it. Swap stores or
//! generators without changing application code.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use a3s_sync::{Collaborators, SessionClient, StaticIdentity, SyncConfig};
//! use a3s_sync::provider::memory::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     text: Arc<dyn a3s_sync::TextGenerator>,
//! #     image: Arc<dyn a3s_sync::ImageGenerator>,
//! # ) -> a3s_sync::Result<()> {
//! let client = SessionClient::start(
//!     SyncConfig::default(),
//!     Collaborators {
//!         store: Arc::new(MemoryStore::default()),
//!         text,
//!         image,
//!         identity: Arc::new(StaticIdentity::new("user-1")),
//!     },
//! )?;
//!
//! let session_id = client.reset().await?;
//! client.send_message("Write a haiku about rain", None, None).await?;
//! if let Some(session) = client.snapshot() {
//!     println!("Session {} has {} messages", session_id, session.messages.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Stores
//!
//! - **memory**: In-memory store for testing and single-process use
//!
//! ## Architecture
//!
//! - **SessionClient**: handle the presentation layer reads and mutates through
//! - **SessionState**: observable single source of truth, mutated by transitions
//! - **DocumentStore** trait: shared store with per-session subscriptions
//! - **TextGenerator** / **ImageGenerator** traits: opaque generative backend
//! - **StreamingAccumulator**: folds streamed increments into one reply
//! - **EchoGuard**: suppresses the notification caused by our own write
//! - **DocumentPublisher**: debounces document edits before writing through

pub mod accumulator;
pub mod client;
pub mod config;
pub mod debounce;
pub mod document;
pub mod echo;
mod engine;
pub mod error;
pub mod generation;
pub mod identity;
pub mod listener;
pub mod provider;
pub mod state;
pub mod types;
mod writer;

// Re-export core types
pub use accumulator::{AccumulatorState, StreamingAccumulator};
pub use client::SessionClient;
pub use config::{DocumentAdoption, SyncConfig};
pub use debounce::DocumentPublisher;
pub use document::{DocumentWrite, SessionPatch, StoreNotification, StoredDocument};
pub use echo::EchoGuard;
pub use engine::Collaborators;
pub use error::{Result, SyncError};
pub use generation::{
    GeneratedImage, GenerationRequest, ImageGenerator, ImageRequest, TextGenerator, TextStream,
};
pub use identity::{IdentityProvider, StaticIdentity};
pub use provider::{DocumentStore, StoreSubscription};
pub use state::{SessionState, Transition};
pub use types::{
    derive_title, Attachment, AttachmentRef, CreativeMode, Message, QualityTier, Role, Session,
    SyncStatus, Turn,
};

// Re-export stores for convenience
pub use provider::memory::{MemoryConfig, MemoryStore};
