//! Search value objects
//!
//! Result rows, retrieval modes, metadata filters, and pool metrics shared
//! by the storage backends and the query orchestrator.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::Document;
use crate::error::Error;
use crate::value_objects::Language;

/// One scored search result row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Stable chunk identifier of the matched document
    pub chunk_id: String,
    /// Score under the producing mode's scale
    pub score: f32,
    /// The matched document
    pub document: Document,
}

/// Per-mode score breakdown attached to fused results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Vector similarity score in `[0, 1]`, if the vector ranking saw this chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<f32>,
    /// Raw BM25 score, if the keyword ranking saw this chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<f32>,
    /// Graph relevance score, if the graph ranking saw this chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<f32>,
}

/// A fused query result returned by the query orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Stable chunk identifier
    pub chunk_id: String,
    /// Chunk text
    pub text: String,
    /// Source path the chunk came from
    pub source: String,
    /// Combined score under the selected mode
    pub score: f32,
    /// Per-mode scores that contributed
    pub scores: ScoreBreakdown,
    /// Document metadata
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Retrieval mode of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// ANN over embeddings
    Vector,
    /// BM25 keyword ranking
    Bm25,
    /// Backend-fused vector + keyword
    #[default]
    Hybrid,
    /// Entity-graph traversal
    Graph,
    /// Vector + keyword + graph fused with RRF
    Multi,
}

impl QueryMode {
    /// The string representation of this mode
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Bm25 => "bm25",
            Self::Hybrid => "hybrid",
            Self::Graph => "graph",
            Self::Multi => "multi",
        }
    }
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "bm25" | "keyword" => Ok(Self::Bm25),
            "hybrid" => Ok(Self::Hybrid),
            "graph" => Ok(Self::Graph),
            "multi" => Ok(Self::Multi),
            other => Err(Error::invalid_argument(format!(
                "Unknown query mode '{other}' (expected vector, bm25, hybrid, graph, or multi)"
            ))),
        }
    }
}

/// Optional metadata predicates applied to search results.
///
/// Backends push these down where possible; otherwise they are evaluated
/// post-retrieval before top-k truncation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Restrict to these source types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_types: Option<Vec<crate::entities::SourceType>>,
    /// Restrict to these languages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<Language>>,
}

impl SearchFilters {
    /// True when no predicate is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_types.is_none() && self.languages.is_none()
    }

    /// Evaluate the predicates against a document
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        if let Some(types) = &self.source_types {
            if !types.contains(&document.source_type) {
                return false;
            }
        }
        if let Some(languages) = &self.languages {
            match document.language {
                Some(lang) if languages.contains(&lang) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Connection pool metrics surfaced by `pool_status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Pool state: `connected`, `degraded`, or `unavailable`
    pub status: String,
    /// Configured base pool size
    pub pool_size: u32,
    /// Idle connections currently checked in
    pub checked_in: u32,
    /// Connections currently checked out
    pub checked_out: u32,
    /// Overflow connections beyond the base pool
    pub overflow: u32,
    /// Always `pool_size + overflow`
    pub total: u32,
}

impl PoolStatus {
    /// Pool status for the embedded backend (degenerate single-slot pool)
    #[must_use]
    pub fn embedded() -> Self {
        Self {
            status: "connected".to_owned(),
            pool_size: 1,
            checked_in: 1,
            checked_out: 0,
            overflow: 0,
            total: 1,
        }
    }
}
