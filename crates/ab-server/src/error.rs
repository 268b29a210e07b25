//! HTTP error mapping
//!
//! Domain error kinds map onto status codes; every error body has the same
//! `{ "error": { "kind", "message" } }` shape.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use ab_domain::error::{Error, ErrorKind};

/// Domain error carried through an axum handler
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

/// Handler result alias
pub type ApiResult<T> = std::result::Result<T, ApiError>;

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::GraphDisabled => StatusCode::CONFLICT,
        ErrorKind::BackendUnavailable | ErrorKind::ProviderUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::DimensionMismatch
        | ErrorKind::Cancelled
        | ErrorKind::Configuration
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(json!({
            "error": {
                "kind": kind.as_str(),
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}
