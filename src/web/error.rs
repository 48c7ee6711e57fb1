//! Error responses for the JSON API.

use crate::container::{ContainerError, ErrorKind};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

/// Result type alias for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// A core error on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub ContainerError);

impl From<ContainerError> for ApiError {
    fn from(e: ContainerError) -> Self {
        Self(e)
    }
}

/// HTTP status for an error kind.
#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::InvalidManifest => StatusCode::BAD_REQUEST,
        ErrorKind::DuplicateGroup => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ImageUnavailable | ErrorKind::RuntimeUnreachable => StatusCode::BAD_GATEWAY,
        ErrorKind::Provisioning | ErrorKind::Runtime | ErrorKind::Io => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = serde_json::json!({
            "success": false,
            "kind": kind,
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
