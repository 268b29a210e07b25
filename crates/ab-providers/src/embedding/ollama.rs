//! Ollama local embedding and summarization providers
//!
//! Self-hosted model server on localhost; no API key required.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use ab_domain::constants::embedding::{DEFAULT_EMBED_BATCH_SIZE, PROVIDER_TIMEOUT_SECS};
use ab_domain::error::{Error, Result};
use ab_domain::ports::{EmbeddingProvider, Summarizer};
use ab_domain::registry::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry, SUMMARIZATION_PROVIDERS,
    SummarizerEntry,
};
use ab_domain::value_objects::Embedding;

use super::retry::with_retry;

/// Name these providers register under
pub const PROVIDER_NAME: &str = "ollama";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
const DEFAULT_EMBED_DIMENSIONS: usize = 768;
const DEFAULT_CHAT_MODEL: &str = "llama3.2";

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama embedding client (`/api/embed`)
pub struct OllamaEmbeddings {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OllamaEmbeddings {
    /// Build from registry configuration
    ///
    /// # Errors
    ///
    /// Returns a message when the HTTP client cannot be constructed.
    pub fn from_config(config: &EmbeddingProviderConfig) -> std::result::Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_owned()),
            dimensions: config.dimensions.unwrap_or(DEFAULT_EMBED_DIMENSIONS),
            batch_size: config.batch_size.unwrap_or(DEFAULT_EMBED_BATCH_SIZE),
        })
    }

    async fn embed_one_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| provider_err(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(provider_err(format!(
                "embed endpoint returned {}",
                response.status()
            )));
        }
        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| provider_err(format!("malformed response: {e}")))?;
        if body.embeddings.len() != texts.len() {
            return Err(provider_err(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        Ok(body
            .embeddings
            .into_iter()
            .map(|vector| Embedding::new(vector, self.model.clone()))
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for window in texts.chunks(self.batch_size.max(1)) {
            let embeddings =
                with_retry(PROVIDER_NAME, "embed_batch", || self.embed_one_batch(window)).await?;
            out.extend(embeddings);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }
}

/// Ollama summarization client (`/api/generate`)
pub struct OllamaSummarizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaSummarizer {
    /// Build from registry configuration
    ///
    /// # Errors
    ///
    /// Returns a message when the HTTP client cannot be constructed.
    pub fn from_config(config: &EmbeddingProviderConfig) -> std::result::Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_owned()),
        })
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&json!({ "model": self.model, "prompt": prompt, "stream": false }))
            .send()
            .await
            .map_err(|e| provider_err(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(provider_err(format!(
                "generate endpoint returned {}",
                response.status()
            )));
        }
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| provider_err(format!("malformed response: {e}")))?;
        Ok(body.response)
    }
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let prompt = format!(
            "Summarize the following content in two or three sentences. \
             Reply with the summary only.\n\n{text}"
        );
        with_retry(PROVIDER_NAME, "summarize", || self.generate(prompt.clone())).await
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        with_retry(PROVIDER_NAME, "complete", || {
            self.generate(prompt.to_owned())
        })
        .await
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }
}

fn provider_err(message: impl Into<String>) -> Error {
    Error::provider_unavailable(PROVIDER_NAME, message)
}

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static OLLAMA_EMBEDDING_ENTRY: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: PROVIDER_NAME,
    description: "Local Ollama /api/embed endpoint (no key required)",
    build: |config| {
        let provider = OllamaEmbeddings::from_config(config)?;
        Ok(Arc::new(provider) as Arc<dyn EmbeddingProvider>)
    },
};

#[linkme::distributed_slice(SUMMARIZATION_PROVIDERS)]
static OLLAMA_SUMMARIZER_ENTRY: SummarizerEntry = SummarizerEntry {
    name: PROVIDER_NAME,
    description: "Local Ollama /api/generate endpoint (no key required)",
    build: |config| {
        let provider = OllamaSummarizer::from_config(config)?;
        Ok(Arc::new(provider) as Arc<dyn Summarizer>)
    },
};
