//! API error types.
//!
//! The API layer is the sole translator from store/service error kinds to
//! wire codes. Every response body carries a stable machine-readable `code`
//! alongside the human-readable message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gophkeeper_store::StoreError;
use serde::Serialize;
use time::Duration;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Seconds until a rate-limited caller may retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited")]
    RateLimited { retry_after: Duration },

    #[error("not found")]
    NotFound,

    #[error("version conflict: {0}")]
    VersionConflict(String),

    #[error("already exists")]
    AlreadyExists,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::RateLimited { .. } => "rate_limited",
            Self::NotFound => "not_found",
            Self::VersionConflict(_) => "version_conflict",
            Self::AlreadyExists => "already_exists",
            Self::Internal(_) => "internal",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::VersionConflict(_) => StatusCode::CONFLICT,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => {
                // Round up so a caller who waits the advertised time is
                // actually past the block.
                let secs = retry_after.whole_seconds().max(0) as u64;
                Some(if retry_after.subsec_nanoseconds() > 0 {
                    secs + 1
                } else {
                    secs
                })
            }
            _ => None,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::VersionConflict(msg) => Self::VersionConflict(msg),
            StoreError::AlreadyExists => Self::AlreadyExists,
            // Raw backend errors never reach clients with detail; the full
            // error goes to the log only.
            StoreError::Database(e) => {
                tracing::error!(error = %e, "database error");
                Self::Internal("database error".to_string())
            }
            StoreError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<gophkeeper_crypto::CryptoError> for ApiError {
    fn from(err: gophkeeper_crypto::CryptoError) -> Self {
        Self::Internal(format!("crypto failure: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after_secs();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            retry_after,
        };

        match retry_after {
            Some(secs) => {
                (status, [("Retry-After", secs.to_string())], Json(body)).into_response()
            }
            None => (status, Json(body)).into_response(),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
