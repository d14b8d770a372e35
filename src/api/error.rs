//! Central `ApiError` type: the one place domain error kinds are mapped to
//! HTTP status codes and the uniform JSON error body (SPEC_FULL.md §7).

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// One of the spec's fixed `error` kind strings (SPEC_FULL.md §6).
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "Bad Request",
            ApiError::RateLimited { .. } => "Too Many Requests",
            ApiError::NotFound(_) => "Not Found",
            ApiError::Conflict(_) => "Bad Request",
            ApiError::Internal(_) => "Internal Server Error",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if matches!(self, ApiError::Internal(_)) {
            tracing::error!(error = %self, "internal error surfaced to client");
        }

        let status = self.status();
        let retry_after = match &self {
            ApiError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
            retry_after,
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::JobNotFound(id) => ApiError::NotFound(format!("job {id}")),
            LedgerError::ActiveJobNotRemovable(id) => {
                ApiError::Conflict(format!("job {id} is active and cannot be removed"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ApiError::NotFound(key),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
