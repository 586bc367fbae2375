//! Query error types

use thiserror::Error;

/// Query errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid aggregation: {0}")]
    InvalidAggregation(String),
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

impl From<regex::Error> for QueryError {
    fn from(e: regex::Error) -> Self {
        QueryError::InvalidFilter(e.to_string())
    }
}
