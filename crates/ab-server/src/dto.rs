//! Wire shapes
//!
//! Request/response DTOs for the JSON surface. Parsing into domain types
//! happens here so handlers stay thin and every validation failure maps to
//! a 400.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ab_application::query::QueryOptions;
use ab_domain::constants::search::{
    DEFAULT_HYBRID_ALPHA, DEFAULT_SCORE_THRESHOLD, DEFAULT_TOP_K,
};
use ab_domain::entities::{Job, JobRequest, SourceType};
use ab_domain::error::{Error, Result};
use ab_domain::value_objects::{Language, QueryMode, QueryResult, SearchFilters};

/// `POST /index` request body
#[derive(Debug, Clone, Deserialize)]
pub struct IndexRequest {
    /// Folder to ingest
    pub path: String,
    /// Ingest code files too (default: docs only)
    #[serde(default)]
    pub include_code: bool,
    /// Restrict code ingestion to these languages
    #[serde(default)]
    pub languages: Vec<String>,
    /// Glob patterns excluded from discovery
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Re-embed and re-upsert unconditionally
    #[serde(default)]
    pub rebuild: bool,
    /// Clear and re-extract the graph index
    #[serde(default)]
    pub rebuild_graph: bool,
}

impl IndexRequest {
    /// Convert into the domain job request.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty path or unknown language tag.
    pub fn into_job_request(self) -> Result<JobRequest> {
        if self.path.trim().is_empty() {
            return Err(Error::invalid_argument("path cannot be empty"));
        }
        for language in &self.languages {
            Language::from_str(language)?;
        }
        Ok(JobRequest {
            folder_path: self.path,
            include_code: self.include_code,
            languages: self.languages,
            exclude_patterns: self.exclude_patterns,
            rebuild: self.rebuild,
            rebuild_graph: self.rebuild_graph,
        })
    }
}

/// `POST /index` response body
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    /// Deterministic job id (existing id when deduplicated)
    pub job_id: String,
}

/// `POST /query` request body
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Natural-language query text
    pub query: String,
    /// Retrieval mode (default `hybrid`)
    #[serde(default)]
    pub mode: Option<String>,
    /// Results to return (default 5)
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Score threshold for vector/hybrid (default 0.3)
    #[serde(default)]
    pub threshold: Option<f32>,
    /// Vector weight for hybrid fusion (default 0.5)
    #[serde(default)]
    pub alpha: Option<f32>,
    /// Source-type filter
    #[serde(default)]
    pub source_types: Vec<String>,
    /// Language filter
    #[serde(default)]
    pub languages: Vec<String>,
    /// Graph traversal depth override
    #[serde(default)]
    pub traversal_depth: Option<usize>,
}

impl QueryRequest {
    /// Parse into the orchestrator's options.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unknown modes, source types,
    /// languages, or out-of-range numeric options.
    pub fn into_options(self) -> Result<(String, QueryOptions)> {
        let mode = match self.mode.as_deref() {
            None => QueryMode::default(),
            Some(raw) => QueryMode::from_str(raw)?,
        };
        let alpha = self.alpha.unwrap_or(DEFAULT_HYBRID_ALPHA);
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::invalid_argument("alpha must be in [0, 1]"));
        }

        let source_types = if self.source_types.is_empty() {
            None
        } else {
            Some(
                self.source_types
                    .iter()
                    .map(|s| SourceType::from_str(s))
                    .collect::<Result<Vec<_>>>()?,
            )
        };
        let languages = if self.languages.is_empty() {
            None
        } else {
            Some(
                self.languages
                    .iter()
                    .map(|s| Language::from_str(s))
                    .collect::<Result<Vec<_>>>()?,
            )
        };

        Ok((
            self.query,
            QueryOptions {
                mode,
                top_k: self.top_k.unwrap_or(DEFAULT_TOP_K),
                threshold: self.threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD),
                alpha,
                filters: SearchFilters {
                    source_types,
                    languages,
                },
                traversal_depth: self.traversal_depth,
            },
        ))
    }
}

/// `POST /query` response body
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// Ordered results
    pub results: Vec<QueryResult>,
    /// Convenience count
    pub count: usize,
}

/// `GET /jobs` response body
#[derive(Debug, Serialize)]
pub struct JobsResponse {
    /// Jobs in submission order
    pub jobs: Vec<Job>,
}

/// `POST /jobs/{id}/cancel` response body
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// The job id
    pub job_id: String,
    /// Status observed immediately after the cancel request
    pub status: String,
}
