//! Router and handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ab_domain::error::Error;

use crate::context::AppContext;
use crate::dto::{
    CancelResponse, IndexRequest, IndexResponse, JobsResponse, QueryRequest, QueryResponse,
};
use crate::error::ApiResult;

/// Build the HTTP surface for one instance
#[must_use]
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/status", get(health_status))
        .route("/health/postgres", get(health_pool))
        .route("/index", post(index))
        .route("/query", post(query))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/cancel", post(cancel_job))
        .route("/reset", post(reset))
        .route("/shutdown", post(shutdown))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Liveness probe: answers fast, always 200 once the listener is up
async fn health(State(ctx): State<AppContext>) -> Json<Value> {
    let snapshot = ctx.health.snapshot().await;
    Json(json!({ "status": snapshot.status }))
}

/// Full aggregated status
async fn health_status(State(ctx): State<AppContext>) -> Json<Value> {
    let snapshot = ctx.health.snapshot().await;
    Json(serde_json::to_value(snapshot).unwrap_or_else(|_| json!({})))
}

/// Backend pool metrics (route name kept stable across backends)
async fn health_pool(State(ctx): State<AppContext>) -> Json<Value> {
    let pool = ctx.backend.pool_status().await;
    Json(serde_json::to_value(pool).unwrap_or_else(|_| json!({})))
}

/// Submit an ingestion job
async fn index(
    State(ctx): State<AppContext>,
    Json(request): Json<IndexRequest>,
) -> ApiResult<(StatusCode, Json<IndexResponse>)> {
    let job_request = request.into_job_request()?;
    let job_id = ctx.queue.submit(job_request).await?;
    Ok((StatusCode::ACCEPTED, Json(IndexResponse { job_id })))
}

/// Execute a retrieval query
async fn query(
    State(ctx): State<AppContext>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<QueryResponse>> {
    let (text, options) = request.into_options()?;
    let results = ctx.query.query(&text, &options).await?;
    let count = results.len();
    Ok(Json(QueryResponse { results, count }))
}

/// All tracked jobs
async fn list_jobs(State(ctx): State<AppContext>) -> Json<JobsResponse> {
    Json(JobsResponse {
        jobs: ctx.queue.list().await,
    })
}

/// One job by id
async fn get_job(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let job = ctx
        .queue
        .get(&id)
        .await
        .ok_or_else(|| Error::not_found(format!("job {id}")))?;
    Ok(Json(serde_json::to_value(job).map_err(Error::from)?))
}

/// Cancel a job (immediate for pending, cooperative for running)
async fn cancel_job(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let status = ctx.queue.cancel(&id).await?;
    Ok(Json(CancelResponse {
        job_id: id,
        status: status.to_string(),
    }))
}

/// Clear all indexed documents
async fn reset(State(ctx): State<AppContext>) -> ApiResult<Json<Value>> {
    ctx.backend.reset().await?;
    Ok(Json(json!({ "status": "reset" })))
}

/// Request graceful shutdown
async fn shutdown(State(ctx): State<AppContext>) -> (StatusCode, Json<Value>) {
    tracing::info!("shutdown requested over HTTP");
    let _ = ctx.shutdown.send(true);
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "shutting_down" })),
    )
}
