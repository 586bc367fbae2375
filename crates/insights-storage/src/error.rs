//! Storage error types

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "Unsupported store URI scheme '{0}': only file collections are supported \
         (file://<path> or a bare path to a JSON/JSONL file)"
    )]
    UnsupportedScheme(String),

    #[error("Invalid store URI: {0}")]
    InvalidUri(String),

    #[error("Invalid document at {location}: {reason}")]
    InvalidDocument { location: String, reason: String },

    #[error("Malformed collection file: {0}")]
    Malformed(String),

    #[error("Query error: {0}")]
    Query(#[from] insights_query::QueryError),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
