//! # Embeddings
//!
//! This crate provides embedding generation, similarity ranking and the
//! persisted embedding store for the self-notes retrieval engine.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors (Ollama, OpenAI)
//! - **Similarity Search**: Exact cosine ranking with stable tie-breaking
//! - **Embedding Store**: Atomic full rebuilds with vector/metadata alignment
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► EmbeddingStore             │
//! │       │                                   │                     │
//! │       ▼                                   ▼                     │
//! │  Ollama/OpenAI                LoadedIndex ──► rank_top_k        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod provider;
pub mod similarity;
pub mod store;

pub use error::{EmbedError, Result, StoreError};
pub use provider::{EmbeddingProvider, OllamaProvider, OpenAIProvider};
pub use similarity::{cosine_similarity, rank_top_k};
pub use store::{EmbeddingRecord, EmbeddingStore, LoadedIndex, SearchHit};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
