//! Search and ranking algorithmic constants
//!
//! These are mathematical/algorithmic invariants, not operational config.

/// BM25 k1 parameter (term frequency saturation)
pub const BM25_K1: f32 = 1.5;
/// BM25 b parameter (document length normalization)
pub const BM25_B: f32 = 0.75;
/// BM25 token minimum length filter
pub const BM25_TOKEN_MIN_LENGTH: usize = 2;

/// RRF K parameter for rank fusion
pub const RRF_K: f32 = 60.0;

/// Default number of results returned by a query
pub const DEFAULT_TOP_K: usize = 5;
/// Default minimum vector/hybrid score surfaced to callers
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.3;
/// Default vector weight in hybrid fusion
pub const DEFAULT_HYBRID_ALPHA: f32 = 0.5;

/// Default multi-mode fusion weight for the vector ranking
pub const MULTI_WEIGHT_VECTOR: f32 = 0.4;
/// Default multi-mode fusion weight for the keyword ranking
pub const MULTI_WEIGHT_KEYWORD: f32 = 0.3;
/// Default multi-mode fusion weight for the graph ranking
pub const MULTI_WEIGHT_GRAPH: f32 = 0.3;

/// Over-fetch multiplier applied before post-retrieval filtering
pub const SEARCH_OVERFETCH_MULTIPLIER: usize = 2;

/// Rank weight multiplier applied to triples whose source chunk is gone
pub const ORPHAN_TRIPLE_WEIGHT: f32 = 0.5;

/// Compiled-in English stopword list used by the keyword analyzer
pub const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];
