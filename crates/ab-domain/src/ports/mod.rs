//! Port interfaces
//!
//! Trait seams between the domain and the outside world. Implementations
//! live in `ab-providers` and register through [`crate::registry`].

/// Chunker port
pub mod chunking;
pub use chunking::DocumentChunker;

/// Embedding and summarization provider ports
pub mod embedding;
pub use embedding::{EmbeddingProvider, Summarizer};

/// Graph store port
pub mod graph;
pub use graph::{GraphSlice, GraphStats, GraphStore, TraversedTriple};

/// Storage backend port
pub mod storage;
pub use storage::StorageBackend;
