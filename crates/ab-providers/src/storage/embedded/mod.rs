//! Embedded storage backend
//!
//! File-backed implementation of the storage contract: documents and their
//! unit-normalized embeddings under `data/vectors/`, keyword postings under
//! `data/keyword/`. Vector search is an exact cosine scan, which makes
//! top-k deterministic under fixed index state by construction. Commits are
//! all-or-nothing: a mutated copy of the state is persisted to disk first
//! and only then swapped in, so neither readers nor the files ever observe
//! a half-applied batch.

mod keyword;

pub use keyword::KeywordIndex;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use ab_domain::entities::{Document, EmbeddedDocument};
use ab_domain::error::{Error, Result};
use ab_domain::ports::StorageBackend;
use ab_domain::registry::{STORAGE_BACKENDS, StorageBackendConfig, StorageBackendEntry};
use ab_domain::value_objects::{
    PoolStatus, SearchFilters, SearchHit, cosine_similarity, cosine_to_unit_score,
};

use crate::fsutil::{read_json, write_json_atomic};
use crate::storage::rrf;

/// Name this backend registers under
pub const BACKEND_NAME: &str = "embedded";

const OVERFETCH: usize = ab_domain::constants::search::SEARCH_OVERFETCH_MULTIPLIER;

/// The `embedding_metadata` singleton, mirroring the relational backend's
/// one-row table: fixes the embedding dimension at first write.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmbeddingMetadata {
    dim: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct VectorFile {
    /// chunk_id → unit-normalized embedding
    vectors: BTreeMap<String, Vec<f32>>,
}

#[derive(Debug, Clone, Default)]
struct EmbeddedState {
    dimension: Option<usize>,
    documents: BTreeMap<String, Document>,
    vectors: BTreeMap<String, Vec<f32>>,
    keyword: KeywordIndex,
}

/// File-backed storage backend
pub struct EmbeddedBackend {
    vectors_dir: PathBuf,
    keyword_dir: PathBuf,
    state: RwLock<EmbeddedState>,
}

impl EmbeddedBackend {
    /// Create a backend rooted at `data_dir` (state is loaded by
    /// [`StorageBackend::initialize`]).
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            vectors_dir: data_dir.join("vectors"),
            keyword_dir: data_dir.join("keyword"),
            state: RwLock::new(EmbeddedState::default()),
        }
    }

    fn metadata_path(&self) -> PathBuf {
        self.vectors_dir.join("embedding_metadata.json")
    }

    fn vectors_path(&self) -> PathBuf {
        self.vectors_dir.join("vectors.json")
    }

    fn documents_path(&self) -> PathBuf {
        self.vectors_dir.join("documents.json")
    }

    fn postings_path(&self) -> PathBuf {
        self.keyword_dir.join("postings.json")
    }

    fn persist(&self, state: &EmbeddedState) -> Result<()> {
        match state.dimension {
            Some(dim) => write_json_atomic(&self.metadata_path(), &EmbeddingMetadata { dim })?,
            None => {
                if self.metadata_path().exists() {
                    std::fs::remove_file(self.metadata_path())?;
                }
            }
        }
        write_json_atomic(
            &self.vectors_path(),
            &VectorFile {
                vectors: state.vectors.clone(),
            },
        )?;
        write_json_atomic(&self.documents_path(), &state.documents)?;
        write_json_atomic(&self.postings_path(), &state.keyword)?;
        Ok(())
    }

    fn scored_vector_ranking(
        state: &EmbeddedState,
        query_vector: &[f32],
        filters: &SearchFilters,
    ) -> Result<Vec<(String, f32)>> {
        if let Some(dim) = state.dimension {
            if query_vector.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: query_vector.len(),
                });
            }
        }

        let mut scored: Vec<(String, f32)> = state
            .vectors
            .iter()
            .filter(|(chunk_id, _)| {
                state
                    .documents
                    .get(chunk_id.as_str())
                    .is_some_and(|doc| filters.matches(doc))
            })
            .map(|(chunk_id, vector)| {
                let score = cosine_to_unit_score(cosine_similarity(query_vector, vector));
                (chunk_id.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(scored)
    }

    fn hits_from_ranking(
        state: &EmbeddedState,
        ranking: Vec<(String, f32)>,
        k: usize,
    ) -> Vec<SearchHit> {
        ranking
            .into_iter()
            .filter_map(|(chunk_id, score)| {
                state.documents.get(&chunk_id).map(|doc| SearchHit {
                    chunk_id,
                    score,
                    document: doc.clone(),
                })
            })
            .take(k)
            .collect()
    }
}

#[async_trait]
impl StorageBackend for EmbeddedBackend {
    async fn initialize(&self) -> Result<()> {
        std::fs::create_dir_all(&self.vectors_dir)?;
        std::fs::create_dir_all(&self.keyword_dir)?;

        let mut state = self.state.write().await;
        state.dimension = read_json::<EmbeddingMetadata>(&self.metadata_path())?.map(|m| m.dim);
        state.vectors = read_json::<VectorFile>(&self.vectors_path())?
            .map(|f| f.vectors)
            .unwrap_or_default();
        state.documents = read_json(&self.documents_path())?.unwrap_or_default();
        state.keyword = read_json(&self.postings_path())?.unwrap_or_default();

        tracing::debug!(
            documents = state.documents.len(),
            dimension = ?state.dimension,
            "embedded backend loaded"
        );
        Ok(())
    }

    async fn upsert_documents(&self, documents: &[EmbeddedDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let mut state = self.state.write().await;

        // Validate the whole batch before touching anything (I1, I2).
        let mut dimension = state.dimension;
        for item in documents {
            let doc = &item.document;
            if doc.chunk_id.is_empty() {
                return Err(Error::invalid_argument("document with empty chunk_id"));
            }
            let actual = item.embedding.vector.len();
            if actual == 0 || actual != item.embedding.dimensions {
                return Err(Error::invalid_argument(format!(
                    "malformed embedding for chunk {}",
                    doc.chunk_id
                )));
            }
            match dimension {
                Some(expected) if expected != actual => {
                    return Err(Error::DimensionMismatch { expected, actual });
                }
                Some(_) => {}
                None => dimension = Some(actual),
            }
        }

        let mut next = state.clone();
        next.dimension = dimension;
        let mut inserted = 0usize;
        for item in documents {
            let chunk_id = item.document.chunk_id.clone();
            if next.documents.insert(chunk_id.clone(), item.document.clone()).is_none() {
                inserted += 1;
            }
            next.vectors
                .insert(chunk_id.clone(), item.embedding.normalized().vector);
            next.keyword.add(&chunk_id, &item.document.text);
        }

        // Disk first, memory second: a failed persist leaves both untouched.
        self.persist(&next)?;
        *state = next;
        Ok(inserted)
    }

    async fn get_count(&self) -> Result<u64> {
        Ok(self.state.read().await.documents.len() as u64)
    }

    async fn get_counts_by_type(&self) -> Result<Vec<(String, u64)>> {
        let state = self.state.read().await;
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for doc in state.documents.values() {
            *counts.entry(doc.source_type.as_str().to_owned()).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn get_documents(&self, chunk_ids: &[String]) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        Ok(chunk_ids
            .iter()
            .filter_map(|id| state.documents.get(id).cloned())
            .collect())
    }

    async fn vector_search(
        &self,
        query_vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let state = self.state.read().await;
        let ranking = Self::scored_vector_ranking(&state, query_vector, filters)?;
        Ok(Self::hits_from_ranking(&state, ranking, k))
    }

    async fn keyword_search(
        &self,
        query: &str,
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let state = self.state.read().await;
        let ranking: Vec<(String, f32)> = state
            .keyword
            .search(query)
            .into_iter()
            .filter(|(chunk_id, _)| {
                state
                    .documents
                    .get(chunk_id)
                    .is_some_and(|doc| filters.matches(doc))
            })
            .collect();
        Ok(Self::hits_from_ranking(&state, ranking, k))
    }

    async fn hybrid_search_with_rrf(
        &self,
        query_vector: &[f32],
        query: &str,
        k: usize,
        alpha: f32,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let state = self.state.read().await;

        let vector_ids: Vec<String> = Self::scored_vector_ranking(&state, query_vector, filters)?
            .into_iter()
            .take(k * OVERFETCH)
            .map(|(id, _)| id)
            .collect();
        let keyword_ids: Vec<String> = state
            .keyword
            .search(query)
            .into_iter()
            .filter(|(chunk_id, _)| {
                state
                    .documents
                    .get(chunk_id)
                    .is_some_and(|doc| filters.matches(doc))
            })
            .take(k * OVERFETCH)
            .map(|(id, _)| id)
            .collect();

        let fused = rrf::fuse_hybrid(&vector_ids, &keyword_ids, alpha);
        Ok(Self::hits_from_ranking(&state, fused, k))
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let empty = EmbeddedState::default();
        self.persist(&empty)?;
        *state = empty;
        Ok(())
    }

    async fn pool_status(&self) -> PoolStatus {
        PoolStatus::embedded()
    }

    fn backend_name(&self) -> &str {
        BACKEND_NAME
    }
}

#[linkme::distributed_slice(STORAGE_BACKENDS)]
static EMBEDDED_BACKEND_ENTRY: StorageBackendEntry = StorageBackendEntry {
    name: BACKEND_NAME,
    description: "File-backed store: exact cosine vectors + BM25 inverted index",
    build: |config: &StorageBackendConfig| Ok(Arc::new(EmbeddedBackend::new(&config.data_dir))),
};
