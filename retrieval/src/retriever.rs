//! Question to ranked context.

use std::sync::Arc;

use tracing::debug;

use selfnotes_embeddings::{EmbeddingProvider, LoadedIndex, SearchHit, StoreError};

use crate::error::RetrieveError;

/// Default number of chunks handed to the composer.
pub const DEFAULT_TOP_K: usize = 4;

/// Embeds questions and ranks indexed chunks against them.
///
/// Question embeddings are never cached; identical calls repeat the backend
/// request and return identical results.
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Retriever {
    /// Create a retriever returning up to `top_k` chunks per question.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, top_k: usize) -> Self {
        Self { provider, top_k }
    }

    /// Number of chunks returned per question.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Rank the chunks of `index` against `question`.
    pub async fn retrieve(
        &self,
        index: &LoadedIndex,
        question: &str,
    ) -> Result<Vec<SearchHit>, RetrieveError> {
        if index.is_empty() {
            return Err(StoreError::EmptyIndex.into());
        }

        let query = self
            .provider
            .embed(question)
            .await
            .map_err(RetrieveError::EmbedFailed)?;
        let hits = index.search(&query, self.top_k)?;

        debug!(
            "Retrieved {} of {} chunks (best score {:?})",
            hits.len(),
            index.len(),
            hits.first().map(|hit| hit.score)
        );
        Ok(hits)
    }
}
