//! Document store trait, the core abstraction for shared storage backends
//!
//! All storage backends (in-memory, hosted document databases, etc.)
//! implement `DocumentStore` to provide a uniform subscribe/read/write API.
//! Delivery of notifications is at-least-once; consumers must tolerate
//! duplicates.

use crate::document::{DocumentWrite, StoreNotification, StoredDocument};
use crate::error::Result;
use async_trait::async_trait;

pub mod memory;

/// Core trait for shared document stores
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a standing subscription to one session document
    ///
    /// The first notification describes the current document (or its
    /// absence). Dropping the returned handle unsubscribes.
    async fn subscribe(&self, session_id: &str) -> Result<Box<dyn StoreSubscription>>;

    /// Merge a partial write into a session document, creating it if needed
    async fn write(&self, session_id: &str, write: &DocumentWrite) -> Result<()>;

    /// Fetch a session document
    async fn read(&self, session_id: &str) -> Result<Option<StoredDocument>>;

    /// Store name (e.g., "memory")
    fn name(&self) -> &str;
}

/// Async subscription handle for receiving document changes
#[async_trait]
pub trait StoreSubscription: Send {
    /// Receive the next notification; `None` once the subscription closed
    async fn next(&mut self) -> Result<Option<StoreNotification>>;
}
