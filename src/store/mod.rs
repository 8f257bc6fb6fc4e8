//! Batch persistence for assembled test case documents.

use std::future::Future;
use std::sync::Mutex;

use thiserror::Error;

use crate::document::TestCaseDocument;

pub mod jsonl;
pub mod pgvector;

pub use jsonl::JsonlStore;
pub use pgvector::PgTestCaseStore;

/// Failures surfaced by a batch store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Postgres rejected a statement or the connection failed.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    /// File sink could not be written.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A document could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Store-specific refusal.
    #[error("{0}")]
    Rejected(String),
}

/// Stores a whole batch at once and reports how many documents were written.
///
/// Implementations either store every document or return an error; callers never
/// observe a partial batch as success.
pub trait BulkPersister {
    /// Persists `documents` in one operation.
    fn insert_many(
        &self,
        documents: &[TestCaseDocument],
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// In-process store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<TestCaseDocument>>,
    failure: Option<String>,
    batches: Mutex<usize>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects every batch with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Snapshot of everything stored so far.
    pub fn documents(&self) -> Vec<TestCaseDocument> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    /// Number of `insert_many` calls received, including rejected ones.
    pub fn batch_count(&self) -> usize {
        self.batches.lock().map(|count| *count).unwrap_or_default()
    }

    fn append(&self, documents: &[TestCaseDocument]) -> Result<usize, StoreError> {
        if let Ok(mut count) = self.batches.lock() {
            *count += 1;
        }
        if let Some(message) = &self.failure {
            return Err(StoreError::Rejected(message.clone()));
        }
        let mut stored = self
            .documents
            .lock()
            .map_err(|_| StoreError::Rejected("memory store lock poisoned".to_string()))?;
        stored.extend_from_slice(documents);
        Ok(documents.len())
    }
}

impl BulkPersister for MemoryStore {
    fn insert_many(
        &self,
        documents: &[TestCaseDocument],
    ) -> impl Future<Output = Result<usize, StoreError>> + Send {
        let result = self.append(documents);
        async move { result }
    }
}
