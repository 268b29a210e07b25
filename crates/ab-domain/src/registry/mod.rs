//! Provider auto-registration registries
//!
//! `linkme` distributed slices map configuration strings to constructors;
//! implementations in `ab-providers` register themselves and are discovered
//! at startup.

/// Embedding and summarization provider registries
pub mod embedding;
pub use embedding::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry, SUMMARIZATION_PROVIDERS,
    SummarizerEntry, list_embedding_providers, list_summarizers, resolve_embedding_provider,
    resolve_summarizer,
};

/// Graph store registry
pub mod graph;
pub use graph::{
    GRAPH_STORES, GraphStoreConfig, GraphStoreEntry, list_graph_stores, resolve_graph_store,
};

/// Storage backend registry
pub mod storage;
pub use storage::{
    STORAGE_BACKENDS, StorageBackendConfig, StorageBackendEntry, list_storage_backends,
    resolve_storage_backend,
};
