//! Text generation backends.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::GenerateError;

/// A model that turns a prompt into text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the model used for generation.
    fn model(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Completions served by a local Ollama instance.
pub struct OllamaGenerator {
    base_url: String,
    client: reqwest::Client,
    model: String,
}

impl OllamaGenerator {
    /// Default Ollama endpoint.
    pub const DEFAULT_URL: &'static str = "http://localhost:11434";

    /// Create a generator for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_URL.to_string(),
            client: reqwest::Client::new(),
            model: model.into(),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        debug!(
            "Generating completion with model {} ({} prompt chars)",
            self.model,
            prompt.chars().count()
        );

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerateError::TransportFailure(format!(
                "ollama returned {status}: {error_text}"
            )));
        }

        let result: OllamaGenerateResponse = response.json().await?;
        Ok(result.response)
    }
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}
