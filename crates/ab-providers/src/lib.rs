//! # Provider Layer
//!
//! Implementations of the `ab-domain` ports: storage backends (embedded and
//! PostgreSQL+pgvector), embedding/summarization providers, language-aware
//! chunkers, and the graph store. Every implementation registers into its
//! domain registry at link time, so configuration strings resolve to
//! constructors without a hand-maintained dispatch table.

/// Chunker implementations
pub mod chunking;
/// Embedding and summarization providers
pub mod embedding;
/// Atomic snapshot persistence helpers
pub mod fsutil;
/// Graph store implementations
pub mod graph;
/// Storage backend implementations
pub mod storage;

pub use chunking::{CodeChunker, TextChunker};
pub use graph::SimpleGraphStore;
pub use storage::{EmbeddedBackend, PostgresBackend};
