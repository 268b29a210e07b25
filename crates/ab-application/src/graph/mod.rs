//! Graph extraction and retrieval

/// Triple extraction (structural + LLM)
pub mod extract;
/// Seed + BFS retrieval
pub mod query;

pub use extract::{llm_triples, parse_triples, structural_triples};
pub use query::graph_search;
