//! Configuration for the notes engine.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! file, a `.env` file and the process environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use selfnotes_documents::ChunkerConfig;

use crate::error::ConfigError;
use crate::pipeline::DEFAULT_CONCURRENCY;
use crate::retriever::DEFAULT_TOP_K;

/// Name of the config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "selfnotes.toml";

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Configuration for the notes engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Directory holding the embedding store.
    pub db_dir: PathBuf,

    /// Base URL of the Ollama server used for embeddings and generation.
    pub ollama_host: String,

    /// Where documents are fetched from.
    pub source: SourceConfig,

    /// Chunk window parameters.
    pub chunking: ChunkerConfig,

    /// Embedding backend.
    pub embedding: EmbeddingConfig,

    /// Generation backend.
    pub generation: GenerationConfig,

    /// Query settings.
    pub retrieval: RetrievalSettings,

    /// HTTP API settings.
    pub server: ServerConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            db_dir: default_db_dir(),
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            source: SourceConfig::default(),
            chunking: ChunkerConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalSettings::default(),
            server: ServerConfig::default(),
        }
    }
}

fn default_db_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("selfnotes")
        .join("db")
}

impl RagConfig {
    /// Load configuration the way the binaries do.
    ///
    /// `explicit` must exist when given. Otherwise `./selfnotes.toml` and then
    /// `<config dir>/selfnotes/config.toml` are tried, falling back to
    /// defaults. Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        let mut config = match Self::locate(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("selfnotes").join("config.toml"));
        }
        candidates.into_iter().find(|path| path.is_file())
    }

    /// Read a TOML config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let SourceConfig::Notion { api_key, .. } = &mut self.source {
            if let Some(key) = lookup("NOTION_API_KEY") {
                *api_key = Some(key);
            }
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(dir) = lookup("SELFNOTES_DB_DIR") {
            self.db_dir = PathBuf::from(dir);
        }
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.ollama_host = if host.contains("://") {
                host
            } else {
                format!("http://{host}")
            };
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid(
                "retrieval.top_k must be greater than zero".to_string(),
            ));
        }
        if self.embedding.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "embedding.concurrency must be greater than zero".to_string(),
            ));
        }
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Content source selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A Notion workspace, starting from the given root pages.
    Notion {
        /// Integration token. Usually supplied through `NOTION_API_KEY`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,

        /// Page URLs or ids to index, including their sub-pages.
        #[serde(default)]
        root_pages: Vec<String>,
    },

    /// Markdown and text files below a local directory.
    Directory {
        path: PathBuf,

        /// File extensions to index. Defaults to `md` and `txt`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extensions: Option<Vec<String>>,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Notion {
            api_key: None,
            root_pages: Vec::new(),
        }
    }
}

/// Configuration for the embedding backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings.
    pub model: String,

    /// Base URL override. Ollama uses `ollama_host` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key for OpenAI-compatible servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum embedding requests in flight while indexing.
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Ollama,
            model: "nomic-embed-text".to_string(),
            base_url: None,
            api_key: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// Local Ollama server.
    Ollama,
    /// OpenAI or a compatible embeddings API.
    #[serde(rename = "openai")]
    OpenAI,
}

/// Configuration for the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model to generate answers with.
    pub model: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "mistral".to_string(),
        }
    }
}

/// Query settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of chunks handed to the generator.
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}
