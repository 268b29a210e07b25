//! Query orchestration

/// Mode routing and fusion
pub mod service;

pub use service::{MultiWeights, QueryOptions, QueryService};
