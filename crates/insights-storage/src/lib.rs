//! Insights Storage - Read-only document store
//!
//! This crate provides the store-access layer handed to the HTTP gateway:
//! - `DocumentStore`: the query interface the gateway depends on
//! - `MemoryStore`: a collection held in memory and queried in place
//! - Collection loading from JSON array or JSON Lines files
//! - Store URI parsing

pub mod engine;
pub mod error;
pub mod loader;
pub mod uri;

pub use engine::{DocumentStore, MemoryStore};
pub use error::{Result, StorageError};
pub use loader::load_collection;
pub use uri::StoreUri;
