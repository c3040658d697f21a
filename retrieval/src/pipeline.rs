//! Full index rebuilds: documents in, committed embedding store out.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use tracing::{debug, info};

use selfnotes_documents::{Chunk, Chunker, ChunkerConfig, DocumentStream};
use selfnotes_embeddings::{
    EmbedError, Embedding, EmbeddingProvider, EmbeddingRecord, EmbeddingStore,
};

use crate::error::PipelineError;

/// Default number of embedding requests in flight.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Statistics about an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Number of documents pulled from the source.
    pub documents: usize,

    /// Number of chunks embedded and committed.
    pub chunks: usize,

    /// Wall clock time of the run in milliseconds.
    pub elapsed_ms: u64,
}

/// Chunks, embeds and commits a document stream as a new index.
///
/// Nothing is written until every chunk has been embedded, so a failed run
/// leaves the previous index in place.
pub struct IndexingPipeline {
    chunker: Chunker,
    provider: Arc<dyn EmbeddingProvider>,
    concurrency: usize,
}

impl IndexingPipeline {
    /// Create a pipeline embedding with `provider`.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        chunking: ChunkerConfig,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            chunker: Chunker::new(chunking)?,
            provider,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// Bound the number of concurrent embedding requests.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The chunking parameters in use.
    pub fn chunking(&self) -> ChunkerConfig {
        self.chunker.config()
    }

    /// Rebuild `store` from `documents`.
    pub async fn run(
        &self,
        mut documents: DocumentStream<'_>,
        store: &EmbeddingStore,
    ) -> Result<IndexStats, PipelineError> {
        let start_time = Instant::now();

        let mut seen = HashSet::new();
        let mut chunks: Vec<Chunk> = Vec::new();
        while let Some(document) = documents.next().await {
            let document = document.map_err(PipelineError::FetchFailed)?;
            if !seen.insert(document.source_id.clone()) {
                return Err(PipelineError::DuplicateDocument(document.source_id));
            }
            let document_chunks = self.chunker.chunk_document(&document);
            info!(
                "Indexing: {} ({} chunks)",
                document.title,
                document_chunks.len()
            );
            chunks.extend(document_chunks);
        }

        let vectors = self.embed_all(&chunks).await?;
        let records: Vec<EmbeddingRecord> = vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, chunk)| EmbeddingRecord::new(vector, chunk))
            .collect();
        let chunk_count = records.len();

        store
            .rebuild(records)
            .await
            .map_err(PipelineError::CommitFailed)?;

        let stats = IndexStats {
            documents: seen.len(),
            chunks: chunk_count,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        };
        info!(
            "Indexed {} chunks from {} documents in {}ms",
            stats.chunks, stats.documents, stats.elapsed_ms
        );
        Ok(stats)
    }

    /// Embed every chunk, keeping input order. The first failure aborts.
    async fn embed_all(&self, chunks: &[Chunk]) -> Result<Vec<Embedding>, PipelineError> {
        stream::iter(chunks.iter().map(|chunk| self.embed_chunk(chunk)))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    /// Embed one chunk, holding the backend to its declared dimension.
    async fn embed_chunk(&self, chunk: &Chunk) -> Result<Embedding, PipelineError> {
        debug!("Embedding chunk {} of {}", chunk.chunk_index, chunk.source_id);
        let embed_failed = |source: EmbedError| PipelineError::EmbedFailed {
            source_id: chunk.source_id.clone(),
            chunk_index: chunk.chunk_index,
            source,
        };

        let vector = self.provider.embed(&chunk.text).await.map_err(embed_failed)?;
        match self.provider.dimension() {
            Some(expected) if expected != vector.len() => {
                Err(embed_failed(EmbedError::InvalidResponse(format!(
                    "expected {expected} dimensions, got {}",
                    vector.len()
                ))))
            }
            _ => Ok(vector),
        }
    }
}
