//! HTTP surface integration tests
//!
//! Drive the router in-process over the embedded backend and the offline
//! hash provider; no network, no external services.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tokio::sync::watch;
use tower::ServiceExt;

use ab_application::{
    GraphBuildSettings, HealthService, IngestService, JobLog, JobQueue, QueryService, spawn_worker,
};
use ab_domain::ports::StorageBackend;
use ab_providers::embedding::{HashEmbeddings, HashSummarizer};
use ab_providers::storage::EmbeddedBackend;
use ab_server::{AppContext, build_router};

struct TestServer {
    router: Router,
    queue: Arc<JobQueue>,
    worker: tokio::task::JoinHandle<()>,
    _dir: tempfile::TempDir,
    corpus: std::path::PathBuf,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn test_server() -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus = dir.path().join("corpus");
    std::fs::create_dir_all(&corpus).expect("mkdir");
    std::fs::write(
        corpus.join("guide.md"),
        "# Guide\n\nThe retrieval service indexes markdown documentation.\n",
    )
    .expect("write");
    std::fs::write(
        corpus.join("setup.md"),
        "# Setup\n\nInstall the binary and run the start command.\n",
    )
    .expect("write");

    let backend: Arc<dyn StorageBackend> = Arc::new(EmbeddedBackend::new(dir.path().join("data")));
    backend.initialize().await.expect("init");
    let embedder: Arc<dyn ab_domain::ports::EmbeddingProvider> = Arc::new(HashEmbeddings::new(16));
    let queue = Arc::new(JobQueue::open(JobLog::at(dir.path().join("queue.log"))).expect("open"));

    let ingest = Arc::new(IngestService::new(
        Arc::clone(&backend),
        Arc::clone(&embedder),
        Arc::new(HashSummarizer),
        None,
        GraphBuildSettings::default(),
    ));
    let worker = spawn_worker(Arc::clone(&queue), ingest);

    let query = Arc::new(QueryService::new(
        Arc::clone(&backend),
        embedder,
        None,
        false,
        2,
    ));
    let health = Arc::new(HealthService::new(
        Arc::clone(&backend),
        Arc::clone(&queue),
        None,
        false,
    ));
    let (shutdown, _) = watch::channel(false);

    let router = build_router(AppContext::new(health, Arc::clone(&queue), query, backend, shutdown));
    TestServer {
        router,
        queue,
        worker,
        _dir: dir,
        corpus,
    }
}

async fn request_json(router: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let request = match body {
        Some(value) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .expect("request"),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    };
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn wait_job_done(server: &TestServer, job_id: &str) {
    for _ in 0..200 {
        if let Some(job) = server.queue.get(job_id).await {
            if job.status.is_terminal() {
                assert_eq!(job.status.as_str(), "done", "job failed: {:?}", job.error);
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} did not finish");
}

#[tokio::test]
async fn health_answers_immediately() {
    let server = test_server().await;
    let (status, body) = request_json(&server.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "starting");
}

#[tokio::test]
async fn index_then_query_round_trip() {
    let server = test_server().await;

    let (status, body) = request_json(
        &server.router,
        "POST",
        "/index",
        Some(serde_json::json!({ "path": server.corpus.to_string_lossy() })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().expect("job id").to_owned();
    wait_job_done(&server, &job_id).await;

    // Identical re-submission before/while live deduplicates; after
    // completion it creates a fresh pending job with the same id.
    let (status, dedup) = request_json(
        &server.router,
        "POST",
        "/index",
        Some(serde_json::json!({ "path": server.corpus.to_string_lossy() })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(dedup["job_id"], job_id.as_str());

    let (status, results) = request_json(
        &server.router,
        "POST",
        "/query",
        Some(serde_json::json!({ "query": "install the binary", "mode": "bm25" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(results["count"].as_u64().expect("count") >= 1);
    let top = &results["results"][0];
    assert_eq!(top["source"], "setup.md");
}

#[tokio::test]
async fn validation_errors_are_400_with_kind() {
    let server = test_server().await;
    let (status, body) = request_json(
        &server.router,
        "POST",
        "/query",
        Some(serde_json::json!({ "query": "x", "mode": "psychic" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_argument");
}

#[tokio::test]
async fn graph_mode_disabled_maps_to_conflict() {
    let server = test_server().await;
    let (status, body) = request_json(
        &server.router,
        "POST",
        "/query",
        Some(serde_json::json!({ "query": "anything", "mode": "graph" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "GraphRAG not enabled");
}

#[tokio::test]
async fn unknown_job_is_404() {
    let server = test_server().await;
    let (status, body) = request_json(&server.router, "GET", "/jobs/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn reset_clears_documents() {
    let server = test_server().await;
    let (status, body) = request_json(
        &server.router,
        "POST",
        "/index",
        Some(serde_json::json!({ "path": server.corpus.to_string_lossy() })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_job_done(&server, body["job_id"].as_str().expect("job id")).await;

    let (status, _) = request_json(&server.router, "POST", "/reset", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, snapshot) = request_json(&server.router, "GET", "/health/status", None).await;
    assert_eq!(snapshot["documents"]["total"], 0);
}

#[tokio::test]
async fn pool_metrics_hold_the_total_invariant() {
    let server = test_server().await;
    let (status, pool) = request_json(&server.router, "GET", "/health/postgres", None).await;
    assert_eq!(status, StatusCode::OK);
    let total = pool["total"].as_u64().expect("total");
    let pool_size = pool["pool_size"].as_u64().expect("pool_size");
    let overflow = pool["overflow"].as_u64().expect("overflow");
    assert_eq!(total, pool_size + overflow);
}
