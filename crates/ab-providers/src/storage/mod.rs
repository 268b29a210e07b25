//! Storage backend implementations

/// File-backed embedded backend
pub mod embedded;
/// PostgreSQL + pgvector backend
pub mod postgres;
/// Reciprocal rank fusion shared by backends and the query layer
pub mod rrf;

pub use embedded::EmbeddedBackend;
pub use postgres::PostgresBackend;
