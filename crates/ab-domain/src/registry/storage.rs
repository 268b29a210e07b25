//! Storage backend registry

use std::path::PathBuf;

/// Configuration handed to storage backend constructors
#[derive(Debug, Clone, Default)]
pub struct StorageBackendConfig {
    /// Backend name (`embedded`, `postgres`)
    pub backend: String,
    /// Data directory for file-backed backends (`<state_dir>/data`)
    pub data_dir: PathBuf,
    /// PostgreSQL connection string, for the `postgres` backend
    pub database_url: Option<String>,
    /// Base connection pool size
    pub pool_size: u32,
    /// Connections allowed beyond the base pool
    pub pool_max_overflow: u32,
    /// HNSW `m` build parameter for the `postgres` backend's vector index
    pub hnsw_m: u32,
    /// HNSW `ef_construction` build parameter for that index
    pub hnsw_ef_construction: u32,
}

impl StorageBackendConfig {
    /// Create a config for the named backend rooted at `data_dir`
    pub fn new(backend: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: backend.into(),
            data_dir: data_dir.into(),
            database_url: None,
            pool_size: 5,
            pool_max_overflow: 10,
            hnsw_m: 16,
            hnsw_ef_construction: 64,
        }
    }

    /// Set the PostgreSQL connection string
    #[must_use]
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// The backend name used for registry resolution
    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.backend
    }
}

crate::impl_registry!(
    provider_trait: crate::ports::StorageBackend,
    config_type: StorageBackendConfig,
    entry_type: StorageBackendEntry,
    slice_name: STORAGE_BACKENDS,
    resolve_fn: resolve_storage_backend,
    list_fn: list_storage_backends
);
