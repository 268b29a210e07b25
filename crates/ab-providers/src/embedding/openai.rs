//! OpenAI-compatible embedding and summarization providers
//!
//! Speaks the `/v1/embeddings` and `/v1/chat/completions` wire shapes, so
//! any OpenAI-compatible endpoint works through `base_url`.

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
pub const PROVIDER_NAME: &str = "openai";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBED_DIMENSIONS: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const SUMMARIZE_PROMPT: &str =
    "Summarize the following content in two or three sentences. Reply with the summary only.";

fn build_client() -> std::result::Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
        .build()
        .map_err(|e| format!("failed to build HTTP client: {e}"))
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// OpenAI-compatible embedding client
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
    batch_size: usize,
}

impl OpenAiEmbeddings {
    /// Build from registry configuration
    ///
    /// # Errors
    ///
    /// Returns a message when the HTTP client cannot be constructed.
    pub fn from_config(config: &EmbeddingProviderConfig) -> std::result::Result<Self, String> {
        Ok(Self {
            client: build_client()?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_owned()),
            api_key: config.api_key.clone(),
            dimensions: config.dimensions.unwrap_or(DEFAULT_EMBED_DIMENSIONS),
            batch_size: config.batch_size.unwrap_or(DEFAULT_EMBED_BATCH_SIZE),
        })
    }

    async fn embed_one_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&json!({ "model": self.model, "input": texts }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| provider_err(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(provider_err(format!(
                "embeddings endpoint returned {}",
                response.status()
            )));
        }
        let body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| provider_err(format!("malformed response: {e}")))?;

        let mut rows = body.data;
        rows.sort_by_key(|row| row.index);
        if rows.len() != texts.len() {
            return Err(provider_err(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                rows.len()
            )));
        }
        Ok(rows
            .into_iter()
            .map(|row| Embedding::new(row.embedding, self.model.clone()))
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
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

/// OpenAI-compatible summarization client
pub struct OpenAiSummarizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiSummarizer {
    /// Build from registry configuration
    ///
    /// # Errors
    ///
    /// Returns a message when the HTTP client cannot be constructed.
    pub fn from_config(config: &EmbeddingProviderConfig) -> std::result::Result<Self, String> {
        Ok(Self {
            client: build_client()?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_owned()),
            api_key: config.api_key.clone(),
        })
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user },
                ],
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| provider_err(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(provider_err(format!(
                "chat endpoint returned {}",
                response.status()
            )));
        }
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| provider_err(format!("malformed response: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| provider_err("empty chat response"))
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        with_retry(PROVIDER_NAME, "summarize", || {
            self.chat(SUMMARIZE_PROMPT, text)
        })
        .await
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        with_retry(PROVIDER_NAME, "complete", || {
            self.chat("You are a precise information extraction system.", prompt)
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
static OPENAI_EMBEDDING_ENTRY: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: PROVIDER_NAME,
    description: "OpenAI-compatible /v1/embeddings endpoint",
    build: |config| {
        let provider = OpenAiEmbeddings::from_config(config)?;
        Ok(Arc::new(provider) as Arc<dyn EmbeddingProvider>)
    },
};

#[linkme::distributed_slice(SUMMARIZATION_PROVIDERS)]
static OPENAI_SUMMARIZER_ENTRY: SummarizerEntry = SummarizerEntry {
    name: PROVIDER_NAME,
    description: "OpenAI-compatible /v1/chat/completions endpoint",
    build: |config| {
        let provider = OpenAiSummarizer::from_config(config)?;
        Ok(Arc::new(provider) as Arc<dyn Summarizer>)
    },
};
