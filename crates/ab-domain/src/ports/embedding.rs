//! Embedding and summarization provider ports

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::value_objects::Embedding;

/// Provider-agnostic embedding interface.
///
/// All providers with the same output dimension are interchangeable.
/// Implementations batch internally up to their provider limit and retry
/// transient failures with exponential backoff.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    ///
    /// # Errors
    ///
    /// Returns `ProviderUnavailable` after the retry policy is exhausted.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Output vector dimension of this provider's model
    fn dimensions(&self) -> usize;

    /// Name this provider registers under
    fn provider_name(&self) -> &str;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// As for [`embed_batch`](EmbeddingProvider::embed_batch).
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let embeddings = self.embed_batch(&[text.to_owned()]).await?;
        embeddings.into_iter().next().ok_or_else(|| {
            Error::provider_unavailable(self.provider_name(), "no embedding returned")
        })
    }

    /// Probe the provider with a tiny request.
    ///
    /// # Errors
    ///
    /// Returns `ProviderUnavailable` when the probe fails.
    async fn health_check(&self) -> Result<()> {
        self.embed("health check").await?;
        Ok(())
    }
}

/// Natural-language summarization interface, also used by the LLM triple
/// extractor.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce a short natural-language description of `text`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderUnavailable` after the retry policy is exhausted.
    async fn summarize(&self, text: &str) -> Result<String>;

    /// Free-form completion against the provider, used by the graph
    /// extractor's constrained prompt.
    ///
    /// # Errors
    ///
    /// Returns `ProviderUnavailable` after the retry policy is exhausted.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Name this provider registers under
    fn provider_name(&self) -> &str;
}
