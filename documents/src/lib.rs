//! # Documents
//!
//! The document side of the self-notes retrieval engine:
//!
//! - **Data model**: [`Document`], [`Chunk`] and [`SourceRef`]
//! - **Chunking**: deterministic fixed-size windows with overlap
//! - **Content sources**: Notion, local directories, in-memory documents
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Documents                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ContentSource ──► Document ──► Chunker ──► Chunk               │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  Notion / Directory / Static                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod chunker;
pub mod directory;
pub mod document;
pub mod error;
pub mod notion;
pub mod source;

pub use chunker::{Chunker, ChunkerConfig, chunk_text};
pub use directory::DirectorySource;
pub use document::{Chunk, Document, SourceRef, distinct_sources};
pub use error::{ChunkError, SourceError};
pub use notion::NotionSource;
pub use source::{ContentSource, DocumentStream, StaticSource};
