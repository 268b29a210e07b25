//! Graph index constants

/// Default cap on LLM-extracted triples per chunk
pub const DEFAULT_MAX_TRIPLETS_PER_CHUNK: usize = 10;

/// Default BFS traversal depth for graph queries
pub const DEFAULT_TRAVERSAL_DEPTH: usize = 2;

/// Maximum normalized edit distance for entity seed matching
pub const SEED_MATCH_MAX_DISTANCE: f32 = 0.25;
