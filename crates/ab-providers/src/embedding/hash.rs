//! Deterministic offline embedding provider
//!
//! Token-hash embeddings: each token contributes a pseudo-random unit
//! pattern derived from its SHA-256 digest, summed and normalized. The same
//! text always maps to the same vector, no network required. Used by tests,
//! offline setups, and as the fallback when no provider is configured.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use ab_domain::error::Result;
use ab_domain::ports::{EmbeddingProvider, Summarizer};
use ab_domain::registry::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry, SUMMARIZATION_PROVIDERS,
    SummarizerEntry,
};
use ab_domain::value_objects::Embedding;

/// Name these providers register under
pub const PROVIDER_NAME: &str = "hash";

const DEFAULT_DIMENSIONS: usize = 64;
const MODEL_NAME: &str = "token-hash";

/// Deterministic hash-based embedder
pub struct HashEmbeddings {
    dimensions: usize,
}

impl HashEmbeddings {
    /// Create an embedder with the given output dimension
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            for (d, slot) in vector.iter_mut().enumerate() {
                let byte = digest[d % digest.len()];
                // Map the byte into [-1, 1], rotated per dimension so short
                // digests still spread across large dimensions.
                let rotated = byte.wrapping_add((d / digest.len()) as u8);
                *slot += f32::from(rotated) / 127.5 - 1.0;
            }
        }
        Embedding::new(vector, MODEL_NAME).normalized()
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }
}

/// Deterministic extractive summarizer: the first sentences up to a budget.
/// The `complete` implementation returns an empty string, which downstream
/// extraction treats as "nothing extracted".
pub struct HashSummarizer;

#[async_trait]
impl Summarizer for HashSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        const BUDGET: usize = 240;
        let mut out = String::new();
        for sentence in text.split_inclusive(['.', '!', '?']) {
            if !out.is_empty() && out.len() + sentence.len() > BUDGET {
                break;
            }
            out.push_str(sentence);
            if out.len() >= BUDGET {
                break;
            }
        }
        Ok(out.trim().to_owned())
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(String::new())
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }
}

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static HASH_EMBEDDING_ENTRY: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: PROVIDER_NAME,
    description: "Deterministic token-hash embeddings (offline, no key)",
    build: |config: &EmbeddingProviderConfig| {
        Ok(Arc::new(HashEmbeddings::new(
            config.dimensions.unwrap_or(DEFAULT_DIMENSIONS),
        )) as Arc<dyn EmbeddingProvider>)
    },
};

#[linkme::distributed_slice(SUMMARIZATION_PROVIDERS)]
static HASH_SUMMARIZER_ENTRY: SummarizerEntry = SummarizerEntry {
    name: PROVIDER_NAME,
    description: "Extractive first-sentences summarizer (offline)",
    build: |_config| Ok(Arc::new(HashSummarizer) as Arc<dyn Summarizer>),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let provider = HashEmbeddings::new(32);
        let a = provider.embed("parse the config file").await.expect("embed");
        let b = provider.embed("parse the config file").await.expect("embed");
        assert_eq!(a.vector, b.vector);
        assert_eq!(a.dimensions, 32);
    }

    #[tokio::test]
    async fn different_text_embeds_differently() {
        let provider = HashEmbeddings::new(32);
        let a = provider.embed("parse the config file").await.expect("embed");
        let b = provider.embed("render the html page").await.expect("embed");
        assert_ne!(a.vector, b.vector);
    }

    #[tokio::test]
    async fn vectors_are_unit_normalized() {
        let provider = HashEmbeddings::new(16);
        let e = provider.embed("anything at all").await.expect("embed");
        assert!((e.norm() - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn summarizer_truncates_at_sentence_boundary() {
        let s = HashSummarizer;
        let text = "First sentence. Second sentence. Third.";
        let summary = s.summarize(text).await.expect("summarize");
        assert!(summary.starts_with("First sentence."));
    }
}
