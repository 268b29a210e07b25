//! Health and status aggregation
//!
//! Reads from the lifecycle, the backend, the queue, and the graph store
//! without mutating any of them. Backend failures degrade the reported
//! status instead of failing the probe; the health endpoint must answer
//! fast and always.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use ab_domain::entities::RuntimeState;
use ab_domain::ports::{GraphStore, StorageBackend};
use ab_domain::value_objects::PoolStatus;

use crate::jobs::{JobQueue, QueueSummary};

/// Overall instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// Listener up, rendezvous not yet published
    Starting,
    /// Everything answers
    Healthy,
    /// Serving, but a subsystem is misbehaving
    Degraded,
    /// The storage backend is unreachable
    Unavailable,
}

/// Document count summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentCounts {
    /// Total documents stored
    pub total: u64,
    /// Counts per source type
    pub by_type: Vec<(String, u64)>,
}

/// Graph index summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphSummary {
    /// Whether the graph index is enabled
    pub enabled: bool,
    /// Store implementation name, when enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    /// Number of entities
    pub entity_count: usize,
    /// Number of relationships (triples)
    pub relationship_count: usize,
}

/// One observable snapshot of the instance
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// Overall status
    pub status: OverallStatus,
    /// Instance mode, when published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Instance id, when published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    /// Base URL, when published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Listening port, when published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Document counts
    pub documents: DocumentCounts,
    /// Backend pool metrics
    pub pool: PoolStatus,
    /// Queue summary
    pub queue: QueueSummary,
    /// Graph summary
    pub graph: GraphSummary,
}

/// The health aggregator
pub struct HealthService {
    backend: Arc<dyn StorageBackend>,
    queue: Arc<JobQueue>,
    graph: Option<Arc<dyn GraphStore>>,
    graph_enabled: bool,
    instance: RwLock<Option<RuntimeState>>,
}

impl HealthService {
    /// Wire the aggregator's read-only collaborators
    #[must_use]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        queue: Arc<JobQueue>,
        graph: Option<Arc<dyn GraphStore>>,
        graph_enabled: bool,
    ) -> Self {
        Self {
            backend,
            queue,
            graph,
            graph_enabled,
            instance: RwLock::new(None),
        }
    }

    /// Record the published rendezvous (moves status out of `starting`)
    pub async fn set_instance(&self, state: RuntimeState) {
        *self.instance.write().await = Some(state);
    }

    /// Aggregate one snapshot. Never fails: subsystem errors show up as
    /// `degraded`/`unavailable` status instead.
    pub async fn snapshot(&self) -> HealthSnapshot {
        let instance = self.instance.read().await.clone();
        let pool = self.backend.pool_status().await;

        let (documents, backend_ok) = match self.backend.get_count().await {
            Ok(total) => {
                let by_type = self
                    .backend
                    .get_counts_by_type()
                    .await
                    .unwrap_or_default();
                (DocumentCounts { total, by_type }, true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "backend unavailable during health probe");
                (DocumentCounts::default(), false)
            }
        };

        let queue = self.queue.summary().await;

        let graph = match (&self.graph, self.graph_enabled) {
            (Some(store), true) => {
                let stats = store.stats().await;
                GraphSummary {
                    enabled: true,
                    store: Some(store.store_name().to_owned()),
                    entity_count: stats.entity_count,
                    relationship_count: stats.triple_count,
                }
            }
            _ => GraphSummary::default(),
        };

        let status = if !backend_ok {
            OverallStatus::Unavailable
        } else if instance.is_none() {
            OverallStatus::Starting
        } else if pool.status != "connected" {
            OverallStatus::Degraded
        } else {
            OverallStatus::Healthy
        };

        HealthSnapshot {
            status,
            mode: instance.as_ref().map(|s| s.mode.to_string()),
            instance_id: instance.as_ref().map(|s| s.instance_id.clone()),
            base_url: instance.as_ref().map(|s| s.base_url.clone()),
            port: instance.as_ref().map(|s| s.port),
            documents,
            pool,
            queue,
            graph,
        }
    }
}
