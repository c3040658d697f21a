//! Error types for indexing, retrieval and answer composition.

use std::path::PathBuf;

use thiserror::Error;

use selfnotes_documents::{ChunkError, SourceError};
use selfnotes_embeddings::{EmbedError, StoreError};

/// Errors returned by a generation backend.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// The request could not be completed.
    #[error("generation request failed: {0}")]
    TransportFailure(String),

    /// The request did not complete in time.
    #[error("generation request timed out")]
    Timeout,

    /// The backend answered with something we could not use.
    #[error("invalid generation response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GenerateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerateError::Timeout
        } else if err.is_decode() {
            GenerateError::InvalidResponse(err.to_string())
        } else {
            GenerateError::TransportFailure(err.to_string())
        }
    }
}

/// Errors that abort an indexing run. The committed index is never touched.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The content source failed while streaming documents.
    #[error("failed to fetch documents: {0}")]
    FetchFailed(#[source] SourceError),

    /// Two documents in one run share a source id.
    #[error("duplicate document {0} in content source")]
    DuplicateDocument(String),

    /// A chunk could not be embedded.
    #[error("failed to embed chunk {chunk_index} of {source_id}: {source}")]
    EmbedFailed {
        source_id: String,
        chunk_index: usize,
        #[source]
        source: EmbedError,
    },

    /// The new index could not be written.
    #[error("failed to commit index: {0}")]
    CommitFailed(#[source] StoreError),

    /// Chunk size and overlap do not describe a valid window.
    #[error("invalid chunking parameters: {0}")]
    InvalidChunking(#[from] ChunkError),
}

/// Errors returned while retrieving context for a question.
#[derive(Error, Debug)]
pub enum RetrieveError {
    /// The question could not be embedded.
    #[error("failed to embed query: {0}")]
    EmbedFailed(#[source] EmbedError),

    /// The index is missing, empty, corrupt or of another dimension.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

/// Errors returned while composing an answer.
#[derive(Error, Debug)]
pub enum ComposeError {
    /// The generation backend failed.
    #[error("failed to generate answer: {0}")]
    GenerateFailed(#[from] GenerateError),
}

/// Errors returned by [`crate::NotesEngine::ask`].
#[derive(Error, Debug)]
pub enum AskError {
    /// The question was blank.
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    #[error(transparent)]
    Compose(#[from] ComposeError),
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or a required value is missing.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
