//! Storage backend port
//!
//! The backend-agnostic contract implemented by the embedded store and by
//! PostgreSQL+pgvector. The backend is the single source of truth for
//! documents and their embeddings; no in-memory index is authoritative.

use async_trait::async_trait;

use crate::entities::{Document, EmbeddedDocument};
use crate::error::Result;
use crate::value_objects::{PoolStatus, SearchFilters, SearchHit};

/// Backend-agnostic storage contract.
///
/// Semantics shared by all implementations:
/// - Upserts are all-or-nothing and keyed on `chunk_id` (replace, not
///   duplicate). The first write fixes the embedding dimension; later
///   writes with a different dimension fail with `DimensionMismatch` and
///   leave prior data intact.
/// - `vector_search` scores are cosine similarity mapped to `[0, 1]` via
///   `(1 + cos) / 2`; `keyword_search` scores are unnormalized BM25
///   (k1=1.5, b=0.75).
/// - Every ordering is strictly descending by score, ties broken by
///   ascending `chunk_id`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Prepare schema and storage files. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` when the backend cannot be reached or
    /// lacks permissions, after the implementation's retry policy.
    async fn initialize(&self) -> Result<()>;

    /// Insert or replace documents with their embeddings, atomically.
    ///
    /// Returns the number of documents whose `chunk_id` was new.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` when any embedding's dimension differs
    /// from the backend's recorded dimension, or `InvalidArgument` for
    /// malformed documents. Nothing is written on error.
    async fn upsert_documents(&self, documents: &[EmbeddedDocument]) -> Result<usize>;

    /// Number of documents currently stored.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` when the backend cannot be reached.
    async fn get_count(&self) -> Result<u64>;

    /// Per-source-type document counts (doc, code, test).
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` when the backend cannot be reached.
    async fn get_counts_by_type(&self) -> Result<Vec<(String, u64)>>;

    /// Fetch documents by chunk id; missing ids are silently absent.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` when the backend cannot be reached.
    async fn get_documents(&self, chunk_ids: &[String]) -> Result<Vec<Document>>;

    /// Top-k by cosine similarity against a query vector.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` when the query vector's dimension
    /// differs from the backend's recorded dimension.
    async fn vector_search(
        &self,
        query_vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>>;

    /// Top-k by BM25 over the keyword postings. A query consisting only of
    /// stop-words yields an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` when the backend cannot be reached.
    async fn keyword_search(
        &self,
        query: &str,
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>>;

    /// Reciprocal-rank fusion of the vector and keyword rankings.
    ///
    /// `alpha` is the vector weight (`1 - alpha` keyword); fused score of a
    /// document is `Σ weight_i / (K + rank_i)` with K=60 and 1-indexed
    /// ranks. Documents present in only one ranking still contribute.
    ///
    /// # Errors
    ///
    /// As for [`vector_search`](StorageBackend::vector_search) and
    /// [`keyword_search`](StorageBackend::keyword_search).
    async fn hybrid_search_with_rrf(
        &self,
        query_vector: &[f32],
        query: &str,
        k: usize,
        alpha: f32,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>>;

    /// Remove all documents and clear the recorded embedding dimension.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` when the backend cannot be reached.
    async fn reset(&self) -> Result<()>;

    /// Connection pool metrics. `total == pool_size + overflow` always.
    async fn pool_status(&self) -> PoolStatus;

    /// Name this backend registers under (`embedded`, `postgres`)
    fn backend_name(&self) -> &str;
}
