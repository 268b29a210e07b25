//! Full-lifecycle server runner
//!
//! The startup sequence from the lifecycle controller, with the listener
//! in the middle:
//!
//! 1. acquire (root, paths, stale recovery, lock)
//! 2. load configuration, resolve providers from the registries
//! 3. bind port 0, serve in the background
//! 4. wait for the health endpoint, then publish the rendezvous
//! 5. block until shutdown is requested (HTTP or signal)
//! 6. graceful teardown bounded to 10 seconds

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use ab_application::{
    GraphBuildSettings, HealthService, IngestService, JobLog, JobQueue, MultiWeights,
    QueryService, spawn_worker,
};
use ab_domain::entities::InstanceMode;
use ab_domain::error::{Error, Result};
use ab_domain::ports::{GraphStore, Summarizer};
use ab_domain::registry::{
    EmbeddingProviderConfig, GraphStoreConfig, StorageBackendConfig, resolve_embedding_provider,
    resolve_graph_store, resolve_storage_backend, resolve_summarizer,
};
use ab_infrastructure::config::{AppConfig, ConfigLoader, resolve_api_key};
use ab_infrastructure::lifecycle::StartupContext;
use ab_infrastructure::rendezvous::wait_healthy;

use crate::context::AppContext;
use crate::routes::build_router;

/// CLI-level overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct ServerOverrides {
    /// Bind host override
    pub host: Option<String>,
    /// Bind port override (0 = OS-assigned)
    pub port: Option<u16>,
}

/// Bound on graceful teardown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
/// Bound on waiting for the listener to answer health probes
const STARTUP_HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a server instance to completion (blocks until shutdown).
///
/// # Errors
///
/// Returns `Conflict` when another instance holds the lock, configuration
/// errors from loading/resolution, and `BackendUnavailable` when the
/// backend cannot initialize.
pub async fn run(
    start_path: &Path,
    mode: InstanceMode,
    overrides: ServerOverrides,
) -> Result<()> {
    let mut startup = StartupContext::acquire(start_path, mode).await?;
    let _log_guard = ab_infrastructure::logging::init_server(&startup.paths.logs_dir());

    let mut config = ConfigLoader::for_project(&startup.paths).load()?;
    if let Some(host) = overrides.host {
        config.server.host = host;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }

    let services = build_services(&config, &startup).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ctx = AppContext::new(
        Arc::clone(&services.health),
        Arc::clone(&services.queue),
        Arc::clone(&services.query),
        Arc::clone(&services.backend),
        shutdown_tx.clone(),
    );

    // Port 0: the OS assigns, which removes the check-then-bind race.
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
            .await
            .map_err(|e| Error::backend_unavailable_with("failed to bind listener", e))?;
    let addr = listener
        .local_addr()
        .map_err(|e| Error::backend_unavailable_with("failed to read bound address", e))?;

    let router = build_router(ctx);
    let mut serve_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = serve_shutdown.wait_for(|stop| *stop).await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "server loop failed");
        }
    });

    let base_url = format!("http://{}:{}", config.server.host, addr.port());
    wait_healthy(&base_url, STARTUP_HEALTH_TIMEOUT).await?;

    // Only now is the instance discoverable.
    let runtime = startup.publish(&config.server.host, addr.port())?;
    services.health.set_instance(runtime).await;
    tracing::info!(%base_url, "agent-brain ready");

    // Block until HTTP shutdown or a signal.
    let mut shutdown_rx = shutdown_rx;
    tokio::select! {
        _ = shutdown_rx.wait_for(|stop| *stop) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    }

    // Graceful teardown, bounded; in-flight work is abandoned after the
    // grace period and the lock released regardless.
    if tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
        tracing::warn!("graceful shutdown timed out, aborting in-flight work");
    }
    services.worker.abort();
    startup.cleanup();
    Ok(())
}

struct Services {
    backend: Arc<dyn ab_domain::ports::StorageBackend>,
    queue: Arc<JobQueue>,
    query: Arc<QueryService>,
    health: Arc<HealthService>,
    worker: tokio::task::JoinHandle<()>,
}

async fn build_services(config: &AppConfig, startup: &StartupContext) -> Result<Services> {
    // Storage backend.
    let mut backend_config =
        StorageBackendConfig::new(&config.backend, startup.paths.data_dir());
    backend_config.pool_size = config.pool_size;
    backend_config.pool_max_overflow = config.pool_max_overflow;
    backend_config.database_url = config.database_url.clone();
    backend_config.hnsw_m = config.hnsw_m;
    backend_config.hnsw_ef_construction = config.hnsw_ef_construction;
    let backend = resolve_storage_backend(&backend_config)?;
    backend.initialize().await?;

    // Providers.
    let embedder = resolve_embedding_provider(&embedding_config(
        &config.embedding.provider,
        config.embedding.model.clone(),
        config.embedding.api_key_env.as_deref(),
        config.embedding.base_url.clone(),
        config.embedding.dimensions,
        config.embedding.batch_size,
    ))?;
    let summarizer: Arc<dyn Summarizer> = resolve_summarizer(&embedding_config(
        &config.summarization.provider,
        config.summarization.model.clone(),
        config.summarization.api_key_env.as_deref(),
        config.summarization.base_url.clone(),
        None,
        None,
    ))?;

    // Graph store (optional).
    let graph: Option<Arc<dyn GraphStore>> = if config.graph.enabled {
        let store = resolve_graph_store(&GraphStoreConfig::new(
            &config.graph.store,
            startup.paths.graph_dir(),
        ))?;
        store.load().await?;
        Some(store)
    } else {
        None
    };

    // Queue + worker + orchestrators.
    let queue = Arc::new(JobQueue::open(JobLog::at(startup.paths.jobs_log()))?);
    let ingest = Arc::new(IngestService::new(
        Arc::clone(&backend),
        Arc::clone(&embedder),
        Arc::clone(&summarizer),
        graph.clone(),
        GraphBuildSettings {
            enabled: config.graph.enabled,
            max_triplets_per_chunk: config.graph.max_triplets_per_chunk,
        },
    ));
    let worker = spawn_worker(Arc::clone(&queue), ingest);

    let query = Arc::new(
        QueryService::new(
            Arc::clone(&backend),
            Arc::clone(&embedder),
            graph.clone(),
            config.graph.enabled,
            config.graph.traversal_depth,
        )
        .with_multi_weights(MultiWeights {
            vector: config.search.multi_weight_vector,
            keyword: config.search.multi_weight_keyword,
            graph: config.search.multi_weight_graph,
        }),
    );
    let health = Arc::new(HealthService::new(
        Arc::clone(&backend),
        Arc::clone(&queue),
        graph,
        config.graph.enabled,
    ));

    Ok(Services {
        backend,
        queue,
        query,
        health,
        worker,
    })
}

fn embedding_config(
    provider: &str,
    model: Option<String>,
    api_key_env: Option<&str>,
    base_url: Option<String>,
    dimensions: Option<usize>,
    batch_size: Option<usize>,
) -> EmbeddingProviderConfig {
    EmbeddingProviderConfig {
        provider: provider.to_owned(),
        model,
        api_key: resolve_api_key(api_key_env),
        base_url,
        dimensions,
        batch_size,
        extra: std::collections::HashMap::new(),
    }
}
