use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use telemetry_core::{TimeRangeError, UnknownSource};
use thiserror::Error;

/// Request-level error for the API. Every failure in the read/aggregate
/// pipeline maps onto one of these kinds; no retries, no partial results.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("database unavailable: {0}")]
    UpstreamUnavailable(sqlx::Error),
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // Decode and protocol failures are bugs on our side, not a
            // database outage, so they must not surface as 503.
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Protocol(_) => ApiError::Internal(anyhow::Error::from(err)),
            other => ApiError::UpstreamUnavailable(other),
        }
    }
}

impl From<UnknownSource> for ApiError {
    fn from(err: UnknownSource) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<TimeRangeError> for ApiError {
    fn from(err: TimeRangeError) -> Self {
        ApiError::InvalidArgument(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
