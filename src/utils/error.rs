//! The `error` module defines the error types used within `docqueue`.
//!
//! Storage operations can only fail with infrastructure errors (`StoreError`).
//! Queue operations wrap those and add the domain errors callers are expected
//! to handle: bad configuration and unknown ack tokens.

/// Low-level store errors (sled, serialization, index consistency).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),
}

/// Errors returned by the queue engine.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Raised by the builder before any store access.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The token is unknown, already consumed, its lease lapsed, or its
    /// record has expired.
    #[error("unidentified ack: {0}")]
    UnknownAck(String),

    #[error("payload encoding error: {0}")]
    Payload(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type Result<T> = std::result::Result<T, QueueError>;
