//! JSON-persisted property graph store
//!
//! Adjacency lists over integer entity indices; cycles across entities and
//! triples are plain graph structure, not an ownership concern. The
//! persisted form is a single `graph.json` with `{entities, triples}`,
//! written copy-on-write (temp + rename) so concurrent readers never see a
//! partial file. Only the ingestion worker mutates the store.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use ab_domain::constants::graph::SEED_MATCH_MAX_DISTANCE;
use ab_domain::entities::{Entity, Predicate, Triple, normalize_entity_name};
use ab_domain::error::{Error, Result};
use ab_domain::ports::{GraphSlice, GraphStats, GraphStore, TraversedTriple};
use ab_domain::registry::{GRAPH_STORES, GraphStoreConfig, GraphStoreEntry};

use crate::fsutil::{read_json, write_json_atomic};

/// Name this store registers under
pub const STORE_NAME: &str = "simple";

const GRAPH_FILE: &str = "graph.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedTriple {
    subject_id: String,
    predicate: Predicate,
    object_id: String,
    source_chunk_id: String,
}

/// The on-disk `{entities, triples}` document
#[derive(Debug, Default, Serialize, Deserialize)]
struct GraphFile {
    entities: Vec<Entity>,
    triples: Vec<PersistedTriple>,
}

#[derive(Debug, Clone)]
struct StoredTriple {
    subject: usize,
    predicate: Predicate,
    object: usize,
    source_chunk_id: String,
}

#[derive(Debug, Default)]
struct GraphState {
    entities: Vec<Entity>,
    entity_index: HashMap<String, usize>,
    triples: Vec<StoredTriple>,
    /// entity index → indices of incident triples (either direction)
    adjacency: HashMap<usize, Vec<usize>>,
    /// dedup keys: (subject, object, predicate, source chunk)
    seen: HashSet<(usize, usize, String, String)>,
}

impl GraphState {
    fn intern(&mut self, entity: &Entity) -> usize {
        if let Some(&idx) = self.entity_index.get(&entity.entity_id) {
            return idx;
        }
        let idx = self.entities.len();
        self.entities.push(entity.clone());
        self.entity_index.insert(entity.entity_id.clone(), idx);
        idx
    }

    fn push_triple(&mut self, subject: usize, predicate: Predicate, object: usize, chunk: String) {
        let key = (subject, object, predicate.as_str().to_owned(), chunk.clone());
        if !self.seen.insert(key) {
            return;
        }
        let idx = self.triples.len();
        self.triples.push(StoredTriple {
            subject,
            predicate,
            object,
            source_chunk_id: chunk,
        });
        self.adjacency.entry(subject).or_default().push(idx);
        if object != subject {
            self.adjacency.entry(object).or_default().push(idx);
        }
    }

    fn to_file(&self) -> GraphFile {
        GraphFile {
            entities: self.entities.clone(),
            triples: self
                .triples
                .iter()
                .map(|t| PersistedTriple {
                    subject_id: self.entities[t.subject].entity_id.clone(),
                    predicate: t.predicate.clone(),
                    object_id: self.entities[t.object].entity_id.clone(),
                    source_chunk_id: t.source_chunk_id.clone(),
                })
                .collect(),
        }
    }

    fn from_file(file: GraphFile) -> Self {
        let mut state = Self::default();
        for entity in &file.entities {
            state.intern(entity);
        }
        for triple in file.triples {
            let (Some(&subject), Some(&object)) = (
                state.entity_index.get(&triple.subject_id),
                state.entity_index.get(&triple.object_id),
            ) else {
                continue;
            };
            state.push_triple(subject, triple.predicate, object, triple.source_chunk_id);
        }
        state
    }

    fn materialize(&self, triple: &StoredTriple) -> Triple {
        Triple {
            subject: self.entities[triple.subject].clone(),
            predicate: triple.predicate.clone(),
            object: self.entities[triple.object].clone(),
            source_chunk_id: triple.source_chunk_id.clone(),
        }
    }

    /// BFS from seed entity indices up to `depth` hops, collecting each
    /// triple at the depth it is first reached.
    fn traverse(&self, seeds: &[usize], depth: usize) -> (Vec<usize>, Vec<(usize, usize)>) {
        let mut visited_entities: HashSet<usize> = seeds.iter().copied().collect();
        let mut entity_order: Vec<usize> = seeds.to_vec();
        let mut visited_triples: HashSet<usize> = HashSet::new();
        let mut reached: Vec<(usize, usize)> = Vec::new();
        let mut frontier: VecDeque<usize> = seeds.iter().copied().collect();

        for level in 1..=depth {
            let mut next = VecDeque::new();
            for entity in frontier.drain(..) {
                let Some(incident) = self.adjacency.get(&entity) else {
                    continue;
                };
                for &triple_idx in incident {
                    if !visited_triples.insert(triple_idx) {
                        continue;
                    }
                    reached.push((triple_idx, level));
                    let triple = &self.triples[triple_idx];
                    for endpoint in [triple.subject, triple.object] {
                        if visited_entities.insert(endpoint) {
                            entity_order.push(endpoint);
                            next.push_back(endpoint);
                        }
                    }
                }
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
        (entity_order, reached)
    }
}

/// Default graph store: in-memory adjacency, JSON persistence
pub struct SimpleGraphStore {
    file_path: PathBuf,
    state: RwLock<GraphState>,
}

impl SimpleGraphStore {
    /// Create a store persisting under `dir` (state is loaded by
    /// [`GraphStore::load`]).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            file_path: dir.into().join(GRAPH_FILE),
            state: RwLock::new(GraphState::default()),
        }
    }
}

#[async_trait]
impl GraphStore for SimpleGraphStore {
    async fn add_triple(&self, triple: Triple) -> Result<()> {
        let mut state = self.state.write().await;
        let subject = state.intern(&triple.subject);
        let object = state.intern(&triple.object);
        state.push_triple(subject, triple.predicate, object, triple.source_chunk_id);
        Ok(())
    }

    async fn find_entities(&self, token: &str) -> Result<Vec<Entity>> {
        let needle = normalize_entity_name(token);
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let state = self.state.read().await;
        Ok(state
            .entities
            .iter()
            .filter(|entity| {
                let name = normalize_entity_name(&entity.name);
                name == needle
                    || name.contains(&needle)
                    || normalized_edit_distance(&name, &needle) <= SEED_MATCH_MAX_DISTANCE
            })
            .cloned()
            .collect())
    }

    async fn neighbors(&self, entity_id: &str, depth: usize) -> Result<Vec<TraversedTriple>> {
        let state = self.state.read().await;
        let Some(&idx) = state.entity_index.get(entity_id) else {
            return Err(Error::not_found(format!("entity {entity_id}")));
        };
        let (_, reached) = state.traverse(&[idx], depth);
        Ok(reached
            .into_iter()
            .map(|(triple_idx, level)| TraversedTriple {
                triple: state.materialize(&state.triples[triple_idx]),
                depth: level,
            })
            .collect())
    }

    async fn subgraph(&self, seed_entity_ids: &[String], depth: usize) -> Result<GraphSlice> {
        let state = self.state.read().await;
        let seeds: Vec<usize> = seed_entity_ids
            .iter()
            .filter_map(|id| state.entity_index.get(id).copied())
            .collect();
        if seeds.is_empty() {
            return Ok(GraphSlice::default());
        }
        let (entity_order, reached) = state.traverse(&seeds, depth);
        Ok(GraphSlice {
            entities: entity_order
                .into_iter()
                .map(|idx| state.entities[idx].clone())
                .collect(),
            triples: reached
                .into_iter()
                .map(|(triple_idx, level)| TraversedTriple {
                    triple: state.materialize(&state.triples[triple_idx]),
                    depth: level,
                })
                .collect(),
        })
    }

    async fn persist(&self) -> Result<()> {
        let state = self.state.read().await;
        write_json_atomic(&self.file_path, &state.to_file())
    }

    async fn load(&self) -> Result<()> {
        let file = read_json::<GraphFile>(&self.file_path)?.unwrap_or_default();
        let mut state = self.state.write().await;
        *state = GraphState::from_file(file);
        tracing::debug!(
            entities = state.entities.len(),
            triples = state.triples.len(),
            "graph store loaded"
        );
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        *state = GraphState::default();
        write_json_atomic(&self.file_path, &state.to_file())
    }

    async fn stats(&self) -> GraphStats {
        let state = self.state.read().await;
        GraphStats {
            entity_count: state.entities.len(),
            triple_count: state.triples.len(),
        }
    }

    async fn predicate_counts(&self) -> HashMap<String, usize> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for triple in &state.triples {
            *counts
                .entry(triple.predicate.as_str().to_owned())
                .or_insert(0) += 1;
        }
        counts
    }

    fn store_name(&self) -> &str {
        STORE_NAME
    }
}

/// Levenshtein distance normalized by the longer input's length
fn normalized_edit_distance(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()] as f32 / a.len().max(b.len()) as f32
}

#[linkme::distributed_slice(GRAPH_STORES)]
static SIMPLE_GRAPH_STORE_ENTRY: GraphStoreEntry = GraphStoreEntry {
    name: STORE_NAME,
    description: "In-memory adjacency graph persisted as JSON",
    build: |config: &GraphStoreConfig| {
        Ok(Arc::new(SimpleGraphStore::new(&config.path)) as Arc<dyn GraphStore>)
    },
};
