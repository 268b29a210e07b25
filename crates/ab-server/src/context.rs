//! Per-instance service context
//!
//! One context struct threaded through handlers via axum state, no
//! module-level singletons. A shared-daemon build would hold one of these
//! per project behind a routing map.

use std::sync::Arc;

use tokio::sync::watch;

use ab_application::{HealthService, JobQueue, QueryService};
use ab_domain::ports::StorageBackend;

/// Shared handler state for one instance
#[derive(Clone)]
pub struct AppContext {
    /// Health aggregator
    pub health: Arc<HealthService>,
    /// Job queue
    pub queue: Arc<JobQueue>,
    /// Query orchestrator
    pub query: Arc<QueryService>,
    /// Storage backend (reset endpoint)
    pub backend: Arc<dyn StorageBackend>,
    /// Graceful-shutdown trigger
    pub shutdown: watch::Sender<bool>,
}

impl AppContext {
    /// Assemble the context from its services
    #[must_use]
    pub fn new(
        health: Arc<HealthService>,
        queue: Arc<JobQueue>,
        query: Arc<QueryService>,
        backend: Arc<dyn StorageBackend>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            health,
            queue,
            query,
            backend,
            shutdown,
        }
    }
}
