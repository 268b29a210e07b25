//! # Domain Layer
//!
//! Core types and contracts for Agent Brain, a per-project retrieval
//! service combining keyword, semantic, and graph-based search.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`entities`] | Documents, graph entities/triples, jobs, runtime state |
//! | [`value_objects`] | Embeddings, search results, filters, languages |
//! | [`ports`] | Storage, embedding, graph, and chunker traits |
//! | [`registry`] | Compile-time provider discovery |
//! | [`constants`] | Algorithmic constants (BM25, RRF, chunk sizes) |
//! | [`error`] | Error taxonomy shared by every layer |
//!
//! The domain crate has no I/O of its own: implementations live in
//! `ab-providers`, and the application layer composes them.

/// Common macros
#[macro_use]
pub mod macros;

/// Domain-level constants
pub mod constants;
/// Core business entities with identity
pub mod entities;
/// Domain error types
pub mod error;
/// Port interfaces implemented by providers
pub mod ports;
/// Provider auto-registration registries
pub mod registry;
/// Immutable value objects
pub mod value_objects;

pub use entities::{
    Document, EmbeddedDocument, Entity, EntityType, InstanceMode, Job, JobRequest, JobStatus,
    Predicate, RUNTIME_SCHEMA_VERSION, RuntimeState, SourceType, SymbolKind, Triple,
};
pub use error::{Error, ErrorKind, Result};
pub use value_objects::{
    Embedding, Language, PoolStatus, QueryMode, QueryResult, ScoreBreakdown, SearchFilters,
    SearchHit,
};
