//! Graph store port

use std::collections::HashMap;

use async_trait::async_trait;

use crate::entities::{Entity, Triple};
use crate::error::Result;

/// A traversal result: one reached triple with the depth it was found at.
#[derive(Debug, Clone)]
pub struct TraversedTriple {
    /// The triple
    pub triple: Triple,
    /// BFS depth from the nearest seed (1 = directly incident)
    pub depth: usize,
}

/// A connected slice of the graph around seed entities
#[derive(Debug, Clone, Default)]
pub struct GraphSlice {
    /// Entities reached by the traversal
    pub entities: Vec<Entity>,
    /// Triples reached by the traversal, with depths
    pub triples: Vec<TraversedTriple>,
}

/// Aggregate counts for health reporting
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct GraphStats {
    /// Number of distinct entities
    pub entity_count: usize,
    /// Number of triples
    pub triple_count: usize,
}

/// Storage contract for the knowledge graph.
///
/// Implementations are adjacency lists over integer entity indices; cycles
/// are expected and harmless. Mutation happens only from the ingestion
/// worker; concurrent readers hold a shared lock while the persist step
/// writes copy-on-write (temp file + rename).
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert a triple, interning both endpoint entities.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the store is in a corrupt state.
    async fn add_triple(&self, triple: Triple) -> Result<()>;

    /// Entities whose normalized name matches `token` within a small
    /// similarity tolerance (substring or edit distance).
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the store is in a corrupt state.
    async fn find_entities(&self, token: &str) -> Result<Vec<Entity>>;

    /// Triples incident to the BFS frontier from `entity_id`, to `depth`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the entity id is unknown.
    async fn neighbors(&self, entity_id: &str, depth: usize) -> Result<Vec<TraversedTriple>>;

    /// BFS expansion from several seeds at once; unknown seeds are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the store is in a corrupt state.
    async fn subgraph(&self, seed_entity_ids: &[String], depth: usize) -> Result<GraphSlice>;

    /// Write the graph to its persistent form atomically.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the write or rename fails.
    async fn persist(&self) -> Result<()>;

    /// Load the persisted graph, replacing in-memory state. Missing
    /// persistence is not an error (empty graph).
    ///
    /// # Errors
    ///
    /// Returns `Json` when the persisted form is corrupt.
    async fn load(&self) -> Result<()>;

    /// Remove all entities and triples (rebuild-graph path).
    ///
    /// # Errors
    ///
    /// Returns `Io` when clearing the persistent form fails.
    async fn clear(&self) -> Result<()>;

    /// Aggregate counts for health reporting
    async fn stats(&self) -> GraphStats;

    /// Per-predicate triple counts, for diagnostics
    async fn predicate_counts(&self) -> HashMap<String, usize>;

    /// Name this store registers under (`simple`, `kuzu`)
    fn store_name(&self) -> &str;
}
