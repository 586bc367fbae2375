//! Insights Query - Aggregation pipelines over insight records
//!
//! This crate provides query capabilities:
//! - Filter and pipeline model with a fluent builder
//! - Group accumulators (count, sum, average, push)
//! - Pipeline execution over an in-memory document slice

pub mod aggregation;
pub mod error;
pub mod executor;
pub mod model;

pub use aggregation::{Accumulator, AccumulatorState};
pub use error::{QueryError, Result};
pub use executor::PipelineExecutor;
pub use model::{
    ContainsPattern, Filter, FindQuery, GroupKey, Pipeline, PipelineBuilder, SortOrder, Stage,
};
