//! Insights Core - Core types for the insights query gateway
//!
//! This crate provides the fundamental data types shared by every layer:
//! - `FieldValue`: The closed set of value kinds a record field can hold
//! - `Document`: A schemaless, insertion-ordered record
//! - `parse_published`: Strict parser for the `published` date format

pub mod date;
pub mod error;
pub mod types;

pub use date::{parse_published, published_year, PUBLISHED_FORMAT};
pub use error::{CoreError, Result};
pub use types::*;
