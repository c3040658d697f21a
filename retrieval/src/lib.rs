//! # Notes Retrieval
//!
//! Indexing and question answering over a personal notes corpus.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          NotesEngine                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   index()                           ask(question)               │
//! │      │                                   │                      │
//! │      ▼                                   ▼                      │
//! │  ┌──────────────┐                ┌──────────────┐               │
//! │  │ContentSource │                │  Retriever   │◄── embed      │
//! │  └──────────────┘                └──────────────┘               │
//! │      │                                   │                      │
//! │      ▼                                   ▼                      │
//! │  ┌──────────────┐   rebuild      ┌──────────────┐               │
//! │  │   Indexing   │──────────────► │  Embedding   │               │
//! │  │   Pipeline   │                │    Store     │               │
//! │  └──────────────┘                └──────────────┘               │
//! │      ▲ chunk + embed                     │ ranked chunks        │
//! │                                          ▼                      │
//! │                                  ┌──────────────┐               │
//! │                                  │   Answer     │◄── generate   │
//! │                                  │   Composer   │               │
//! │                                  └──────────────┘               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use selfnotes_retrieval::{NotesEngine, RagConfig};
//!
//! let config = RagConfig::load(None)?;
//! let engine = NotesEngine::from_config(&config)?;
//!
//! engine.index().await?;
//! let answer = engine.ask("What is my leg day routine?").await?;
//! println!("{}", answer.with_citations());
//! ```

pub mod composer;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod retriever;

pub use composer::{Answer, AnswerComposer, build_prompt};
pub use config::{EmbeddingProviderType, RagConfig, SourceConfig};
pub use engine::{NotesEngine, NotesEngineBuilder};
pub use error::{AskError, ComposeError, ConfigError, GenerateError, PipelineError, RetrieveError};
pub use generation::{GenerationProvider, OllamaGenerator};
pub use pipeline::{IndexStats, IndexingPipeline};
pub use retriever::Retriever;

// Re-export from dependencies for convenience
pub use selfnotes_documents::{ChunkerConfig, ContentSource, Document, SourceRef, StaticSource};
pub use selfnotes_embeddings::{
    EmbedError, Embedding, EmbeddingProvider, EmbeddingStore, SearchHit, StoreError,
};
