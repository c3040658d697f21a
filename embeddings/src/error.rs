//! Error types for embedding providers and the embedding store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by an embedding backend.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// The request could not be completed.
    #[error("embedding request failed: {0}")]
    TransportFailure(String),

    /// The request did not complete in time.
    #[error("embedding request timed out")]
    Timeout,

    /// The backend answered with something we could not use.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    /// Provider not configured (missing API key).
    #[error("embedding provider not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for EmbedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmbedError::Timeout
        } else if err.is_decode() {
            EmbedError::InvalidResponse(err.to_string())
        } else {
            EmbedError::TransportFailure(err.to_string())
        }
    }
}

/// Errors returned by the embedding store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No index has been committed at this location yet.
    #[error("no index found at {}; run `selfnotes index` first", .0.display())]
    NotFound(PathBuf),

    /// Persisted vectors and metadata disagree.
    #[error("index is corrupt: {0}")]
    Corrupt(String),

    /// A rebuild could not be committed. The previous index is intact.
    #[error("failed to write index: {0}")]
    WriteFailed(String),

    /// The index holds no records.
    #[error("index is empty; nothing has been indexed yet")]
    EmptyIndex,

    /// A vector's length differs from the index dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
