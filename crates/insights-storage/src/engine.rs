//! Document store - the query interface handed to the gateway
//!
//! The gateway never reaches for a global handle. It receives an
//! `Arc<dyn DocumentStore>` at construction and issues every query through it.

use crate::error::Result;
use crate::loader::load_collection;
use crate::uri::StoreUri;
use insights_core::Document;
use insights_query::{Filter, FindQuery, Pipeline, PipelineExecutor};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Read-only access to a single collection of insight records
pub trait DocumentStore: Send + Sync {
    /// Run an aggregation pipeline over the collection
    fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>>;

    /// Retrieve documents matching a filter, honoring skip/limit
    fn find(&self, query: &FindQuery) -> Result<Vec<Document>>;

    /// Count documents matching a filter
    fn count_documents(&self, filter: &Filter) -> Result<u64>;

    /// Total number of documents in the collection
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collection held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Arc<Vec<Document>>,
    executor: PipelineExecutor,
}

impl MemoryStore {
    /// Create a store over an already loaded collection
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: Arc::new(documents),
            executor: PipelineExecutor::new(),
        }
    }

    /// Resolve a connection string and load the collection it points at
    pub fn connect(connection: &str) -> Result<Self> {
        let uri = StoreUri::parse(connection)?;
        Self::open(&uri)
    }

    /// Load the collection behind a parsed URI
    pub fn open(uri: &StoreUri) -> Result<Self> {
        let start = Instant::now();
        let documents = match uri {
            StoreUri::File(path) => load_collection(path)?,
        };

        info!(
            "Loaded {} insight records from {} in {:.1}ms",
            documents.len(),
            uri,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self::new(documents))
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }
}

impl DocumentStore for MemoryStore {
    fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>> {
        Ok(self.executor.execute(pipeline, &self.documents)?)
    }

    fn find(&self, query: &FindQuery) -> Result<Vec<Document>> {
        Ok(self.executor.find(query, &self.documents))
    }

    fn count_documents(&self, filter: &Filter) -> Result<u64> {
        Ok(self.executor.count(filter, &self.documents))
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}
