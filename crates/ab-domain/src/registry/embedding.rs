//! Embedding and summarization provider registries
//!
//! Providers register via `#[linkme::distributed_slice]` entries and are
//! resolved at startup from the configured provider name. A missing name is
//! a configuration error surfaced before the server accepts traffic.

use std::collections::HashMap;

/// Configuration handed to embedding/summarization provider constructors.
///
/// Providers use the fields they need and ignore the rest.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingProviderConfig {
    /// Provider name (`openai`, `ollama`, `hash`)
    pub provider: String,
    /// Model name/identifier
    pub model: Option<String>,
    /// API key resolved from the configured environment variable
    pub api_key: Option<String>,
    /// Base URL override for the provider API
    pub base_url: Option<String>,
    /// Expected embedding dimensions (validated on first response)
    pub dimensions: Option<usize>,
    /// Texts per request batch
    pub batch_size: Option<usize>,
    /// Additional provider-specific configuration
    pub extra: HashMap<String, String>,
}

impl EmbeddingProviderConfig {
    /// Create a config with the given provider name
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    /// Set the model name
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL for the API
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the embedding dimensions
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// The provider name used for registry resolution
    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider
    }
}

crate::impl_registry!(
    provider_trait: crate::ports::EmbeddingProvider,
    config_type: EmbeddingProviderConfig,
    entry_type: EmbeddingProviderEntry,
    slice_name: EMBEDDING_PROVIDERS,
    resolve_fn: resolve_embedding_provider,
    list_fn: list_embedding_providers
);

crate::impl_registry!(
    provider_trait: crate::ports::Summarizer,
    config_type: EmbeddingProviderConfig,
    entry_type: SummarizerEntry,
    slice_name: SUMMARIZATION_PROVIDERS,
    resolve_fn: resolve_summarizer,
    list_fn: list_summarizers
);
