//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{FeedEntry, RenderedMessage, SlotKey, VideoHit};

/// Error type for content provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// Port for a content feed (articles and podcasts, optionally videos)
#[async_trait]
pub trait FeedProvider: Send + Sync {
    /// Fetch the current entries, in feed order
    async fn entries(&self) -> Result<Vec<FeedEntry>, ProviderError>;

    /// Human-readable name used in logs
    fn name(&self) -> &str;
}

/// Port for a ranked video keyword search
#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Search for videos, returned in provider rank order
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<VideoHit>, ProviderError>;
}

/// A remote document together with the version token it was read at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionedDocument {
    /// Decoded payload
    pub content: String,
    /// Version token; `None` when the document does not exist yet
    pub version: Option<String>,
}

/// Error type for remote document operations
#[derive(Debug, Error)]
pub enum RemoteDocumentError {
    #[error("Document changed since it was read")]
    Conflict,
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// Port for a shared, versioned key-value blob
#[async_trait]
pub trait RemoteDocument: Send + Sync {
    /// Read the document and its current version
    async fn read(&self) -> Result<VersionedDocument, RemoteDocumentError>;

    /// Replace the document, failing with `Conflict` if `version` is stale
    async fn write(&self, content: &str, version: Option<&str>) -> Result<(), RemoteDocumentError>;
}

/// Error type for the local used-item log
#[derive(Debug, Error)]
pub enum UsedLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Log unavailable: {0}")]
    Unavailable(String),
}

/// Port for the local append-only record of used identifiers
#[async_trait]
pub trait UsedLog: Send + Sync {
    /// Read every recorded identifier (may contain duplicates)
    async fn read_all(&self) -> Result<Vec<String>, UsedLogError>;

    /// Append one identifier
    async fn append(&self, id: &str) -> Result<(), UsedLogError>;
}

/// Error type for publisher operations
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Destination unreachable: {0}")]
    Unreachable(String),
    #[error("Message rejected: {0}")]
    Rejected(String),
}

/// Port for the outbound message channel
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Send a message to the given destination
    async fn send(&self, destination: &str, message: &RenderedMessage)
    -> Result<(), PublishError>;

    /// Get the platform name (e.g., "outbox")
    fn platform(&self) -> &'static str;
}

/// Error type for slot ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for remembering the last fired slot across restarts
#[async_trait]
pub trait SlotLedger: Send + Sync {
    /// The most recently fired slot occurrence, if any
    async fn last_fired(&self) -> Result<Option<SlotKey>, LedgerError>;

    /// Record that a slot occurrence fired
    async fn record(&self, key: &SlotKey) -> Result<(), LedgerError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
