//! PostgreSQL + pgvector storage backend
//!
//! One `documents` table with a pgvector embedding column and a generated
//! tsvector column; the one-row `embedding_metadata` table fixes the
//! embedding dimension at first write. The embedding column starts untyped
//! and is narrowed to `vector(D)` (plus its HNSW index) the moment the
//! dimension is known, because pgvector's HNSW index needs a typed column.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

use ab_domain::entities::{Document, EmbeddedDocument};
use ab_domain::error::{Error, Result};
use ab_domain::ports::StorageBackend;
use ab_domain::registry::{STORAGE_BACKENDS, StorageBackendConfig, StorageBackendEntry};
use ab_domain::value_objects::{PoolStatus, SearchFilters, SearchHit};

use crate::storage::rrf;

/// Name this backend registers under
pub const BACKEND_NAME: &str = "postgres";

const CONNECT_MAX_ATTEMPTS: u32 = 5;
const CONNECT_BASE_DELAY: Duration = Duration::from_millis(500);
const CONNECT_MAX_DELAY: Duration = Duration::from_secs(8);
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

const OVERFETCH: usize = ab_domain::constants::search::SEARCH_OVERFETCH_MULTIPLIER;

/// PostgreSQL-backed storage
pub struct PostgresBackend {
    pool: PgPool,
    pool_size: u32,
    pool_max_overflow: u32,
    hnsw_m: u32,
    hnsw_ef_construction: u32,
}

impl PostgresBackend {
    /// Create a backend from its registry configuration. The pool is lazy;
    /// no connection is attempted until [`StorageBackend::initialize`].
    ///
    /// # Errors
    ///
    /// Returns a message when `database_url` is missing or unparsable.
    pub fn from_config(config: &StorageBackendConfig) -> std::result::Result<Self, String> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| "postgres backend requires database_url".to_owned())?;
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size + config.pool_max_overflow)
            .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
            .connect_lazy(url)
            .map_err(|e| format!("invalid database_url: {e}"))?;
        Ok(Self {
            pool,
            pool_size: config.pool_size,
            pool_max_overflow: config.pool_max_overflow,
            hnsw_m: config.hnsw_m,
            hnsw_ef_construction: config.hnsw_ef_construction,
        })
    }

    async fn ensure_schema(&self) -> std::result::Result<(), sqlx::Error> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS embedding_metadata (
                 id  INT PRIMARY KEY DEFAULT 1 CHECK (id = 1),
                 dim INT NOT NULL CHECK (dim > 0)
             )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                 chunk_id    TEXT PRIMARY KEY,
                 source      TEXT NOT NULL,
                 source_type TEXT NOT NULL,
                 language    TEXT,
                 text        TEXT NOT NULL,
                 embedding   vector,
                 tsv         tsvector GENERATED ALWAYS AS (to_tsvector('english', text)) STORED,
                 metadata    JSONB NOT NULL DEFAULT '{}'::jsonb,
                 document    JSONB NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS documents_tsv_idx ON documents USING GIN (tsv)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS documents_metadata_idx ON documents USING GIN (metadata)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Recorded embedding dimension, if any write has fixed it yet
    async fn recorded_dimension(&self) -> Result<Option<usize>> {
        let row = sqlx::query("SELECT dim FROM embedding_metadata WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(row.map(|r| r.get::<i32, _>("dim") as usize))
    }

    /// Narrow the embedding column to `vector(dim)` and build the HNSW index
    /// with the configured build parameters
    async fn fix_dimension(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        dim: usize,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO embedding_metadata (id, dim) VALUES (1, $1)")
            .bind(dim as i32)
            .execute(&mut **tx)
            .await?;
        sqlx::query(sqlx::AssertSqlSafe(format!(
            "ALTER TABLE documents ALTER COLUMN embedding TYPE vector({dim})"
        )))
        .execute(&mut **tx)
        .await?;
        sqlx::query(sqlx::AssertSqlSafe(format!(
            "CREATE INDEX IF NOT EXISTS documents_embedding_idx ON documents \
             USING hnsw (embedding vector_cosine_ops) \
             WITH (m = {}, ef_construction = {})",
            self.hnsw_m, self.hnsw_ef_construction
        )))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    fn hit_from_row(row: &PgRow) -> Result<SearchHit> {
        let chunk_id: String = row.get("chunk_id");
        let score: f64 = row.get("score");
        let document: serde_json::Value = row.get("document");
        let document: Document = serde_json::from_value(document)?;
        Ok(SearchHit {
            chunk_id,
            score: score as f32,
            document,
        })
    }

    fn filter_binds(filters: &SearchFilters) -> (Option<Vec<String>>, Option<Vec<String>>) {
        let source_types = filters
            .source_types
            .as_ref()
            .map(|types| types.iter().map(|t| t.as_str().to_owned()).collect());
        let languages = filters
            .languages
            .as_ref()
            .map(|langs| langs.iter().map(|l| l.as_str().to_owned()).collect());
        (source_types, languages)
    }

    async fn vector_ranking(
        &self,
        query_vector: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        if let Some(expected) = self.recorded_dimension().await? {
            if query_vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        } else {
            return Ok(Vec::new());
        }

        let (source_types, languages) = Self::filter_binds(filters);
        let rows = sqlx::query(
            "SELECT chunk_id, document, (2 - (embedding <=> $1)) / 2 AS score
             FROM documents
             WHERE embedding IS NOT NULL
               AND ($2::text[] IS NULL OR source_type = ANY($2))
               AND ($3::text[] IS NULL OR language = ANY($3))
             ORDER BY score DESC, chunk_id ASC
             LIMIT $4",
        )
        .bind(Vector::from(query_vector.to_vec()))
        .bind(source_types)
        .bind(languages)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.iter().map(Self::hit_from_row).collect()
    }

    async fn keyword_ranking(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let (source_types, languages) = Self::filter_binds(filters);
        let rows = sqlx::query(
            "SELECT chunk_id, document,
                    ts_rank_cd(tsv, plainto_tsquery('english', $1))::float8 AS score
             FROM documents
             WHERE tsv @@ plainto_tsquery('english', $1)
               AND ($2::text[] IS NULL OR source_type = ANY($2))
               AND ($3::text[] IS NULL OR language = ANY($3))
             ORDER BY score DESC, chunk_id ASC
             LIMIT $4",
        )
        .bind(query)
        .bind(source_types)
        .bind(languages)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.iter().map(Self::hit_from_row).collect()
    }
}

#[async_trait]
impl StorageBackend for PostgresBackend {
    async fn initialize(&self) -> Result<()> {
        let mut delay = CONNECT_BASE_DELAY;
        let mut last_error = None;
        for attempt in 1..=CONNECT_MAX_ATTEMPTS {
            match self.ensure_schema().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max = CONNECT_MAX_ATTEMPTS,
                        error = %e,
                        "postgres initialization failed, backing off"
                    );
                    last_error = Some(e);
                    if attempt < CONNECT_MAX_ATTEMPTS {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(CONNECT_MAX_DELAY);
                    }
                }
            }
        }
        Err(match last_error {
            Some(e) => Error::backend_unavailable_with("postgres initialization failed", e),
            None => Error::backend_unavailable("postgres initialization failed"),
        })
    }

    async fn upsert_documents(&self, documents: &[EmbeddedDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        // Validate the batch before opening the transaction (I1).
        let mut dimension = self.recorded_dimension().await?;
        let newly_fixed = dimension.is_none();
        for item in documents {
            let actual = item.embedding.vector.len();
            if item.document.chunk_id.is_empty() {
                return Err(Error::invalid_argument("document with empty chunk_id"));
            }
            if actual == 0 || actual != item.embedding.dimensions {
                return Err(Error::invalid_argument(format!(
                    "malformed embedding for chunk {}",
                    item.document.chunk_id
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
        let dim = dimension.unwrap_or_default();

        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        if newly_fixed {
            self.fix_dimension(&mut tx, dim).await.map_err(backend_err)?;
        }

        let mut inserted = 0usize;
        for item in documents {
            let doc = &item.document;
            let language = doc.language.map(|l| l.as_str().to_owned());
            let metadata = serde_json::to_value(&doc.metadata)?;
            let document_json = serde_json::to_value(doc)?;
            let row = sqlx::query(
                "INSERT INTO documents
                     (chunk_id, source, source_type, language, text, embedding, metadata, document)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (chunk_id) DO UPDATE SET
                     source = EXCLUDED.source,
                     source_type = EXCLUDED.source_type,
                     language = EXCLUDED.language,
                     text = EXCLUDED.text,
                     embedding = EXCLUDED.embedding,
                     metadata = EXCLUDED.metadata,
                     document = EXCLUDED.document
                 RETURNING (xmax = 0) AS inserted",
            )
            .bind(&doc.chunk_id)
            .bind(&doc.source_path)
            .bind(doc.source_type.as_str())
            .bind(language)
            .bind(&doc.text)
            .bind(Vector::from(item.embedding.normalized().vector))
            .bind(metadata)
            .bind(document_json)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend_err)?;
            if row.get::<bool, _>("inserted") {
                inserted += 1;
            }
        }

        tx.commit().await.map_err(backend_err)?;
        Ok(inserted)
    }

    async fn get_count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn get_counts_by_type(&self) -> Result<Vec<(String, u64)>> {
        let rows = sqlx::query(
            "SELECT source_type, COUNT(*) AS n FROM documents
             GROUP BY source_type ORDER BY source_type",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>("source_type"), r.get::<i64, _>("n") as u64))
            .collect())
    }

    async fn get_documents(&self, chunk_ids: &[String]) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT document FROM documents WHERE chunk_id = ANY($1) ORDER BY chunk_id",
        )
        .bind(chunk_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;
        rows.iter()
            .map(|r| {
                let value: serde_json::Value = r.get("document");
                serde_json::from_value(value).map_err(Error::from)
            })
            .collect()
    }

    async fn vector_search(
        &self,
        query_vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        self.vector_ranking(query_vector, k, filters).await
    }

    async fn keyword_search(
        &self,
        query: &str,
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        self.keyword_ranking(query, k, filters).await
    }

    async fn hybrid_search_with_rrf(
        &self,
        query_vector: &[f32],
        query: &str,
        k: usize,
        alpha: f32,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let vector_hits = self.vector_ranking(query_vector, k * OVERFETCH, filters).await?;
        let keyword_hits = self.keyword_ranking(query, k * OVERFETCH, filters).await?;

        let mut documents: std::collections::HashMap<String, Document> = std::collections::HashMap::new();
        for hit in vector_hits.iter().chain(keyword_hits.iter()) {
            documents
                .entry(hit.chunk_id.clone())
                .or_insert_with(|| hit.document.clone());
        }

        let vector_ids: Vec<String> = vector_hits.iter().map(|h| h.chunk_id.clone()).collect();
        let keyword_ids: Vec<String> = keyword_hits.iter().map(|h| h.chunk_id.clone()).collect();
        let fused = rrf::fuse_hybrid(&vector_ids, &keyword_ids, alpha);

        Ok(fused
            .into_iter()
            .filter_map(|(chunk_id, score)| {
                documents.remove(&chunk_id).map(|document| SearchHit {
                    chunk_id,
                    score,
                    document,
                })
            })
            .take(k)
            .collect())
    }

    async fn reset(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        sqlx::query("TRUNCATE documents")
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;
        sqlx::query("DELETE FROM embedding_metadata")
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;
        tx.commit().await.map_err(backend_err)?;
        Ok(())
    }

    async fn pool_status(&self) -> PoolStatus {
        let checked_in = self.pool.num_idle() as u32;
        let in_use = self.pool.size().saturating_sub(checked_in);
        PoolStatus {
            status: if self.pool.is_closed() {
                "unavailable".to_owned()
            } else {
                "connected".to_owned()
            },
            pool_size: self.pool_size,
            checked_in,
            checked_out: in_use,
            overflow: self.pool_max_overflow,
            total: self.pool_size + self.pool_max_overflow,
        }
    }

    fn backend_name(&self) -> &str {
        BACKEND_NAME
    }
}

fn backend_err(e: sqlx::Error) -> Error {
    Error::backend_unavailable_with("postgres operation failed", e)
}

#[linkme::distributed_slice(STORAGE_BACKENDS)]
static POSTGRES_BACKEND_ENTRY: StorageBackendEntry = StorageBackendEntry {
    name: BACKEND_NAME,
    description: "PostgreSQL + pgvector: HNSW vectors, tsvector keywords",
    build: |config: &StorageBackendConfig| {
        let backend = PostgresBackend::from_config(config)?;
        Ok(Arc::new(backend) as Arc<dyn StorageBackend>)
    },
};
