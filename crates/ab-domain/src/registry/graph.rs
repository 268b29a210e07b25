//! Graph store registry

use std::path::PathBuf;

/// Configuration handed to graph store constructors
#[derive(Debug, Clone, Default)]
pub struct GraphStoreConfig {
    /// Store name (`simple`; `kuzu` is recognized but not shipped)
    pub store: String,
    /// Directory the store persists into (`<state_dir>/data/graph`)
    pub path: PathBuf,
}

impl GraphStoreConfig {
    /// Create a config for the named store persisting under `path`
    pub fn new(store: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
            path: path.into(),
        }
    }

    /// The store name used for registry resolution
    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.store
    }
}

crate::impl_registry!(
    provider_trait: crate::ports::GraphStore,
    config_type: GraphStoreConfig,
    entry_type: GraphStoreEntry,
    slice_name: GRAPH_STORES,
    resolve_fn: resolve_graph_store,
    list_fn: list_graph_stores
);
