//! # HTTP Layer
//!
//! The axum surface of an Agent Brain instance and the full-lifecycle
//! runner the CLI's `start` command drives. Handlers are thin: DTO parsing
//! in [`dto`], status mapping in [`error`], and all behavior behind the
//! application services carried by [`context::AppContext`].

/// Per-instance service context
pub mod context;
/// Wire shapes
pub mod dto;
/// HTTP error mapping
pub mod error;
/// Router and handlers
pub mod routes;
/// Full-lifecycle server runner
pub mod run;

pub use context::AppContext;
pub use routes::build_router;
pub use run::{ServerOverrides, run};
