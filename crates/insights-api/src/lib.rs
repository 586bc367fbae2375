//! Insights API - Read-only HTTP query gateway
//!
//! This crate provides the HTTP API:
//! - Fixed aggregation pipelines, one per endpoint
//! - Handlers that run them against an injected document store
//! - Response shaping into parallel arrays or grouped documents
//! - Uniform `{status: 0, message}` error responses

pub mod error;
pub mod handlers;
pub mod queries;
pub mod router;

pub use error::{ApiError, Result};
pub use handlers::AppState;
pub use router::create_router;
