//! Embedding and summarization provider implementations
//!
//! Providers register into the domain registries at link time; configuration
//! selects one by name. All providers with the same output dimension are
//! interchangeable.

/// Deterministic offline provider
pub mod hash;
/// Ollama local provider
pub mod ollama;
/// OpenAI-compatible provider
pub mod openai;
/// Shared retry policy
pub mod retry;

pub use hash::{HashEmbeddings, HashSummarizer};
pub use ollama::{OllamaEmbeddings, OllamaSummarizer};
pub use openai::{OpenAiEmbeddings, OpenAiSummarizer};
