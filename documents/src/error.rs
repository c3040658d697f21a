//! Error types for documents, chunking and content sources.

use thiserror::Error;

/// Invalid chunking parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// Windows must hold at least one character.
    #[error("chunk size must be greater than zero")]
    ZeroSize,

    /// The window would never advance.
    #[error("chunk overlap {overlap} must be smaller than chunk size {size}")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// Errors raised while pulling documents from a content source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The request could not be completed.
    #[error("content source request failed: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("content source request timed out")]
    Timeout,

    /// Credentials or root pages are missing.
    #[error("content source not configured: {0}")]
    NotConfigured(String),

    /// A root page reference could not be turned into a page id.
    #[error("could not parse page id from: {0}")]
    InvalidPageId(String),

    /// The source answered with something we could not understand.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Local file access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::InvalidResponse(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}
