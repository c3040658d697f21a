//! The notes engine facade.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use selfnotes_documents::{
    ChunkerConfig, ContentSource, DirectorySource, NotionSource, SourceError, SourceRef,
};
use selfnotes_embeddings::{
    EmbeddingProvider, EmbeddingStore, OllamaProvider, OpenAIProvider, StoreError,
};

use crate::composer::{Answer, AnswerComposer};
use crate::config::{EmbeddingProviderType, RagConfig, SourceConfig};
use crate::error::{AskError, ConfigError, PipelineError, RetrieveError};
use crate::generation::{GenerationProvider, OllamaGenerator};
use crate::pipeline::{DEFAULT_CONCURRENCY, IndexStats, IndexingPipeline};
use crate::retriever::{DEFAULT_TOP_K, Retriever};

/// Indexes a content source and answers questions about it.
///
/// This is the entry point used by the CLI and the API server. It owns the
/// store handle and every collaborator; operations share no state besides
/// the store on disk.
pub struct NotesEngine {
    store: EmbeddingStore,

    /// The content source, or why it could not be set up.
    source: Result<Arc<dyn ContentSource>, String>,

    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    pipeline: IndexingPipeline,
    retriever: Retriever,
    composer: AnswerComposer,
}

impl NotesEngine {
    /// Create a new engine builder.
    pub fn builder() -> NotesEngineBuilder {
        NotesEngineBuilder::new()
    }

    /// Build an engine with the collaborators described by `config`.
    ///
    /// An unusable content source does not fail construction; it is
    /// reported when indexing.
    pub fn from_config(config: &RagConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut builder = Self::builder()
            .with_db_dir(&config.db_dir)
            .with_embedder(build_embedder(config))
            .with_generator(Arc::new(
                OllamaGenerator::new(&config.generation.model).with_base_url(&config.ollama_host),
            ))
            .with_chunking(config.chunking)
            .with_top_k(config.retrieval.top_k)
            .with_concurrency(config.embedding.concurrency);

        match build_source(&config.source) {
            Ok(source) => builder = builder.with_source(source),
            Err(e) => {
                debug!("Content source unavailable: {e}");
                builder.source_error = Some(e.to_string());
            }
        }

        builder.build()
    }

    /// The store this engine reads and rebuilds.
    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    /// Name and model of the embedding backend.
    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    /// Name and model of the generation backend.
    pub fn generator(&self) -> &dyn GenerationProvider {
        self.generator.as_ref()
    }

    /// Fetch every document, embed it and replace the index.
    pub async fn index(&self) -> Result<IndexStats, PipelineError> {
        let source = self.source.as_ref().map_err(|reason| {
            PipelineError::FetchFailed(SourceError::NotConfigured(reason.clone()))
        })?;

        info!(
            "Indexing from {} into {}",
            source.name(),
            self.store.root().display()
        );
        self.pipeline.run(source.fetch_all(), &self.store).await
    }

    /// Answer `question` from the indexed notes.
    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        let index = self.store.load().await.map_err(RetrieveError::from)?;
        let hits = self.retriever.retrieve(&index, question).await?;
        let answer = self.composer.compose(question, &hits).await?;

        info!(
            "Answered from {} chunks across {} sources",
            hits.len(),
            answer.sources.len()
        );
        Ok(answer)
    }

    /// Distinct documents in the current index, in store order.
    pub async fn list_sources(&self) -> Result<Vec<SourceRef>, StoreError> {
        Ok(self.store.load().await?.sources())
    }
}

fn build_embedder(config: &RagConfig) -> Arc<dyn EmbeddingProvider> {
    let embedding = &config.embedding;
    match embedding.provider {
        EmbeddingProviderType::Ollama => Arc::new(
            OllamaProvider::new(&embedding.model).with_base_url(
                embedding
                    .base_url
                    .as_deref()
                    .unwrap_or(&config.ollama_host),
            ),
        ),
        EmbeddingProviderType::OpenAI => {
            let mut provider = OpenAIProvider::new().with_model(&embedding.model);
            if let Some(url) = &embedding.base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(key) = &embedding.api_key {
                provider = provider.with_api_key(key);
            }
            Arc::new(provider)
        }
    }
}

fn build_source(config: &SourceConfig) -> Result<Arc<dyn ContentSource>, SourceError> {
    match config {
        SourceConfig::Notion {
            api_key,
            root_pages,
        } => Ok(Arc::new(NotionSource::new(
            api_key.clone().unwrap_or_default(),
            root_pages.clone(),
        )?)),
        SourceConfig::Directory { path, extensions } => {
            let mut source = DirectorySource::new(path);
            if let Some(extensions) = extensions {
                source = source.with_extensions(extensions.clone());
            }
            Ok(Arc::new(source))
        }
    }
}

/// Builder for [`NotesEngine`].
pub struct NotesEngineBuilder {
    db_dir: Option<PathBuf>,
    source: Option<Arc<dyn ContentSource>>,
    source_error: Option<String>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn GenerationProvider>>,
    chunking: ChunkerConfig,
    top_k: usize,
    concurrency: usize,
}

impl NotesEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            db_dir: None,
            source: None,
            source_error: None,
            embedder: None,
            generator: None,
            chunking: ChunkerConfig::default(),
            top_k: DEFAULT_TOP_K,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set the store directory.
    pub fn with_db_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.db_dir = Some(dir.into());
        self
    }

    /// Set the content source.
    pub fn with_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.source = Some(source);
        self.source_error = None;
        self
    }

    /// Set the embedding backend.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the generation backend.
    pub fn with_generator(mut self, generator: Arc<dyn GenerationProvider>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the chunk window parameters.
    pub fn with_chunking(mut self, chunking: ChunkerConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the number of concurrent embedding requests while indexing.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<NotesEngine, ConfigError> {
        let db_dir = self
            .db_dir
            .ok_or_else(|| ConfigError::Invalid("a store directory is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| ConfigError::Invalid("an embedding provider is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| ConfigError::Invalid("a generation provider is required".to_string()))?;
        if self.top_k == 0 {
            return Err(ConfigError::Invalid(
                "top_k must be greater than zero".to_string(),
            ));
        }

        let pipeline = IndexingPipeline::new(embedder.clone(), self.chunking)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?
            .with_concurrency(self.concurrency);

        let source = match (self.source, self.source_error) {
            (Some(source), _) => Ok(source),
            (None, Some(reason)) => Err(reason),
            (None, None) => Err("no content source configured".to_string()),
        };

        Ok(NotesEngine {
            store: EmbeddingStore::new(db_dir),
            source,
            retriever: Retriever::new(embedder.clone(), self.top_k),
            composer: AnswerComposer::new(generator.clone()),
            embedder,
            generator,
            pipeline,
        })
    }
}

impl Default for NotesEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
