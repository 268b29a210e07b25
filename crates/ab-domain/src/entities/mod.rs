//! Domain Entities
//!
//! Core entities of the Agent Brain domain. Entities have identity and are
//! persisted by the storage backend, the graph store, or the job log.

/// Indexable chunk entity
pub mod document;
pub use document::{Document, EmbeddedDocument, SourceType, SymbolKind};

/// Knowledge graph entities and triples
pub mod graph;
pub use graph::{
    EXTRACTED_PREDICATES, Entity, EntityType, Predicate, Triple, normalize_entity_name,
};

/// Ingestion job entity
pub mod job;
pub use job::{Job, JobRequest, JobStatus};

/// Rendezvous descriptor
pub mod runtime_state;
pub use runtime_state::{InstanceMode, RUNTIME_SCHEMA_VERSION, RuntimeState};
