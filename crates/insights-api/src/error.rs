//! API error types
//!
//! Every failure reaches the caller in the same shape,
//! `{"status": 0, "message": "..."}`, with HTTP 500.

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query timeout: exceeded {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u8,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);

        let body = ErrorResponse {
            status: 0,
            message: self.to_string(),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::InvalidParameter {
            name: "query".to_string(),
            reason: e.body_text(),
        }
    }
}

impl From<insights_storage::StorageError> for ApiError {
    fn from(e: insights_storage::StorageError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl From<insights_query::QueryError> for ApiError {
    fn from(e: insights_query::QueryError) -> Self {
        ApiError::Query(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_is_500() {
        let errors = vec![
            ApiError::InvalidParameter {
                name: "page".to_string(),
                reason: "must be a positive integer".to_string(),
            },
            ApiError::Query("bad".to_string()),
            ApiError::Storage("down".to_string()),
            ApiError::Timeout(30),
            ApiError::Internal("boom".to_string()),
        ];
        for err in errors {
            assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_conversions_keep_message() {
        let err: ApiError = insights_query::QueryError::InvalidPipeline("limit".to_string()).into();
        assert!(matches!(err, ApiError::Query(ref m) if m.contains("limit")));

        let err: ApiError =
            insights_storage::StorageError::UnsupportedScheme("mongodb".to_string()).into();
        assert!(err.to_string().contains("mongodb"));
    }
}
