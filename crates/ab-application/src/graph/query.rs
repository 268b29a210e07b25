//! Graph retrieval
//!
//! Seed entities are string-matched from query tokens, the graph is
//! BFS-expanded to the traversal depth, and the traversed triples'
//! provenance chunks are ranked by inverse depth, then by the number of
//! contributing triples. Triples whose source chunk no longer exists in
//! the backend are orphans: they still shape the ranking (at half weight)
//! but cannot be materialized into results.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ab_domain::constants::search::ORPHAN_TRIPLE_WEIGHT;
use ab_domain::entities::Document;
use ab_domain::error::Result;
use ab_domain::ports::{GraphStore, StorageBackend};
use ab_domain::value_objects::SearchHit;

/// Cap on seed entities so one broad token cannot explode the traversal
const MAX_SEEDS: usize = 16;

/// Execute a graph-mode retrieval.
///
/// # Errors
///
/// Returns backend errors from document materialization; an empty graph or
/// no seed match yields an empty list.
pub async fn graph_search(
    store: &Arc<dyn GraphStore>,
    backend: &Arc<dyn StorageBackend>,
    query: &str,
    top_k: usize,
    traversal_depth: usize,
) -> Result<Vec<SearchHit>> {
    let mut seed_ids: Vec<String> = Vec::new();
    for token in query_tokens(query) {
        for entity in store.find_entities(&token).await? {
            if !seed_ids.contains(&entity.entity_id) {
                seed_ids.push(entity.entity_id);
            }
        }
        if seed_ids.len() >= MAX_SEEDS {
            seed_ids.truncate(MAX_SEEDS);
            break;
        }
    }
    if seed_ids.is_empty() {
        return Ok(Vec::new());
    }

    let slice = store.subgraph(&seed_ids, traversal_depth).await?;
    if slice.triples.is_empty() {
        return Ok(Vec::new());
    }

    // Provenance chunks with the depth and count of their triples.
    let mut contributions: BTreeMap<String, (f32, usize)> = BTreeMap::new();
    for traversed in &slice.triples {
        let entry = contributions
            .entry(traversed.triple.source_chunk_id.clone())
            .or_insert((0.0, 0));
        entry.0 += 1.0 / traversed.depth as f32;
        entry.1 += 1;
    }

    let chunk_ids: Vec<String> = contributions.keys().cloned().collect();
    let documents: HashMap<String, Document> = backend
        .get_documents(&chunk_ids)
        .await?
        .into_iter()
        .map(|doc| (doc.chunk_id.clone(), doc))
        .collect();

    let mut ranked: Vec<(String, f32, usize)> = contributions
        .into_iter()
        .map(|(chunk_id, (depth_score, count))| {
            let weight = if documents.contains_key(&chunk_id) {
                1.0
            } else {
                ORPHAN_TRIPLE_WEIGHT
            };
            (chunk_id, depth_score * weight, count)
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.2.cmp(&a.2))
            .then_with(|| a.0.cmp(&b.0))
    });

    // Normalize scores into [0, 1] against the best contribution.
    let max_score = ranked.first().map_or(1.0, |(_, s, _)| s.max(f32::EPSILON));
    let mut documents = documents;
    Ok(ranked
        .into_iter()
        .filter_map(|(chunk_id, score, _)| {
            documents.remove(&chunk_id).map(|document| SearchHit {
                chunk_id,
                score: score / max_score,
                document,
            })
        })
        .take(top_k)
        .collect())
}

fn query_tokens(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .collect();
    tokens.dedup();
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_domain::entities::{EmbeddedDocument, Entity, EntityType, Predicate, Triple};
    use ab_domain::value_objects::Embedding;
    use ab_providers::graph::SimpleGraphStore;
    use ab_providers::storage::EmbeddedBackend;

    async fn fixture() -> (Arc<dyn GraphStore>, Arc<dyn StorageBackend>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn GraphStore> = Arc::new(SimpleGraphStore::new(dir.path().join("graph")));
        let backend: Arc<dyn StorageBackend> =
            Arc::new(EmbeddedBackend::new(dir.path().join("data")));
        backend.initialize().await.expect("init");

        // class ChildService extends BaseService, defined in services.py.
        let child = Entity::new("ChildService", EntityType::Class);
        let base = Entity::new("BaseService", EntityType::Class);
        store
            .add_triple(Triple::new(
                child.clone(),
                Predicate::Extends,
                base.clone(),
                "chunk-child",
            ))
            .await
            .expect("add");
        store
            .add_triple(Triple::new(
                child,
                Predicate::DefinedIn,
                Entity::new("services.py", EntityType::Module),
                "chunk-child",
            ))
            .await
            .expect("add");

        let mut doc = Document::test_fixture("chunk-child", "class ChildService(BaseService): ...");
        doc.source_path = "services.py".to_owned();
        backend
            .upsert_documents(&[EmbeddedDocument {
                document: doc,
                embedding: Embedding::new(vec![1.0, 0.0, 0.0, 0.0], "test"),
            }])
            .await
            .expect("upsert");

        (store, backend, dir)
    }

    #[tokio::test]
    async fn querying_a_parent_reaches_the_child_definition() {
        let (store, backend, _dir) = fixture().await;
        let hits = graph_search(&store, &backend, "BaseService", 5, 2)
            .await
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "chunk-child");
        assert!(hits[0].document.source_path.contains("services.py"));
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn no_seed_match_is_empty_not_error() {
        let (store, backend, _dir) = fixture().await;
        let hits = graph_search(&store, &backend, "zzzzzz", 5, 2)
            .await
            .expect("search");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn orphaned_provenance_is_not_materialized() {
        let (store, backend, _dir) = fixture().await;
        backend.reset().await.expect("reset");

        // Triples survive the reset but their chunks are gone.
        let hits = graph_search(&store, &backend, "BaseService", 5, 2)
            .await
            .expect("search");
        assert!(hits.is_empty());
    }
}
