//! Error types for remasterd

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - e.g. mastering already in flight
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unsupported source media (415)
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// Dependency not ready (503) - e.g. no API key configured
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The remote mastering service misbehaved (502)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<remaster_client::Error> for ApiError {
    fn from(err: remaster_client::Error) -> Self {
        use remaster_client::Error as ClientError;
        match err {
            ClientError::AuthMissing => {
                ApiError::Unavailable("mastering API key is not configured".to_string())
            }
            ClientError::FileNotFound { path } => {
                ApiError::NotFound(format!("audio file not found: {}", path.display()))
            }
            ClientError::InvalidParameter { field, message } => {
                ApiError::BadRequest(format!("{}: {}", field, message))
            }
            ClientError::JobIdMissing => {
                ApiError::Conflict("no mastering job recorded".to_string())
            }
            ClientError::RemoteRejected { status, message } => {
                ApiError::Upstream(format!("remote answered {}: {}", status, message))
            }
            ClientError::MalformedResponse { context } => ApiError::Upstream(context),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::UnsupportedMedia(msg) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA", msg)
            }
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg)
            }
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
