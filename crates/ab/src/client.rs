//! Instance discovery and HTTP client
//!
//! Commands that talk to a running instance discover it through the
//! rendezvous file, validate it (live pid + answering health endpoint),
//! and then speak JSON to its base URL. Error bodies are mapped back onto
//! domain error kinds so exit codes stay faithful.

use std::path::Path;
use std::time::Duration;

use ab_domain::entities::RuntimeState;
use ab_domain::error::{Error, Result};
use ab_infrastructure::paths::StatePaths;
use ab_infrastructure::project::resolve_project_root;
use ab_infrastructure::rendezvous::discover_live_instance;

/// Request timeout for CLI→instance calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client bound to one discovered instance
pub struct InstanceClient {
    /// The validated rendezvous descriptor
    pub runtime: RuntimeState,
    http: reqwest::Client,
}

impl InstanceClient {
    /// Discover and validate the instance for `start_path`'s project.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no live instance is discoverable.
    pub async fn discover(start_path: &Path) -> Result<Self> {
        let project_root = resolve_project_root(start_path).await?;
        let paths = StatePaths::for_project(&project_root);
        let runtime = discover_live_instance(&paths).await.ok_or_else(|| {
            Error::not_found(format!(
                "no running instance for {}",
                project_root.display()
            ))
        })?;
        Ok(Self::for_runtime(runtime)?)
    }

    /// Client for an already-validated descriptor
    ///
    /// # Errors
    ///
    /// Returns `Internal` when the HTTP client cannot be built.
    pub fn for_runtime(runtime: RuntimeState) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { runtime, http })
    }

    /// `GET {base_url}{path}`, parsed as JSON
    ///
    /// # Errors
    ///
    /// Returns the mapped server error or `BackendUnavailable` for
    /// transport failures.
    pub async fn get(&self, path: &str) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(format!("{}{path}", self.runtime.base_url))
            .send()
            .await
            .map_err(transport_err)?;
        parse_response(response).await
    }

    /// `POST {base_url}{path}` with a JSON body
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .http
            .post(format!("{}{path}", self.runtime.base_url))
            .json(body)
            .send()
            .await
            .map_err(transport_err)?;
        parse_response(response).await
    }

    /// `POST {base_url}{path}` with no body
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub async fn post_empty(&self, path: &str) -> Result<serde_json::Value> {
        self.post(path, &serde_json::json!({})).await
    }
}

fn transport_err(e: reqwest::Error) -> Error {
    Error::backend_unavailable(format!("instance unreachable: {e}"))
}

async fn parse_response(response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
    if status.is_success() {
        return Ok(body);
    }

    let kind = body["error"]["kind"].as_str().unwrap_or("internal");
    let message = body["error"]["message"]
        .as_str()
        .unwrap_or("request failed")
        .to_owned();
    Err(error_from_kind(kind, message, status.as_u16()))
}

fn error_from_kind(kind: &str, message: String, status: u16) -> Error {
    match kind {
        "invalid_argument" => Error::InvalidArgument { message },
        "not_found" => Error::NotFound { resource: message },
        "conflict" => Error::Conflict { message },
        "graph_disabled" => Error::GraphDisabled,
        "backend_unavailable" => Error::backend_unavailable(message),
        "provider_unavailable" => Error::provider_unavailable("remote", message),
        "timeout" => Error::timeout(message),
        "configuration" => Error::configuration(message),
        _ => Error::internal(format!("HTTP {status}: {message}")),
    }
}
