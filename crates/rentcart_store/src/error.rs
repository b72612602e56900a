//! Error types for the persistence layer.

use thiserror::Error;

/// Failures reported by a [`crate::KvBackend`].
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend refused the write because it is out of space.
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    /// The backend cannot be used at all (missing directory, disabled).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// IO error (file system operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence errors surfaced by [`crate::PersistentStore`].
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Persistent storage is not available")]
    Unavailable,

    /// Serialized record is over the configured ceiling.
    #[error("Record too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    /// The write hit the backend quota. `evicted` older records were removed
    /// to make room; the write itself was not retried.
    #[error("Storage quota exceeded ({evicted} older records evicted)")]
    QuotaExceeded { evicted: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl StorageError {
    /// Whether retrying the same write may now succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QuotaExceeded { evicted } if *evicted > 0)
    }
}
