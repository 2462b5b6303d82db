//! IndexSink trait definition.

use serde_json::Value;
use sync_core::{Document, SyncError};

/// Outcome of making sure the target index exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Created,
    AlreadyExists,
}

/// Per-document results of one bulk upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub created: usize,
    pub updated: usize,
    /// Documents whose merged content was already stored.
    pub noop: usize,
}

impl BulkSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.noop
    }
}

/// Trait for writing documents to a search index.
///
/// Errors are already classified: a transient error means the whole call
/// may be retried, since upserts are idempotent.
///
/// The orchestrator is generic over this trait so the production sink and
/// the in-memory index share one code path.
#[async_trait::async_trait]
pub trait IndexSink: Send + Sync {
    /// Create `index` with `body` (settings and mappings) unless it
    /// already exists. An existing index is never modified.
    async fn ensure_index(&self, index: &str, body: &Value) -> Result<IndexStatus, SyncError>;

    /// Upsert every document in one request, merging fields onto any
    /// stored document with the same id. An empty slice is a no-op.
    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[Document],
    ) -> Result<BulkSummary, SyncError>;
}

#[async_trait::async_trait]
impl<T: IndexSink + ?Sized> IndexSink for Box<T> {
    async fn ensure_index(&self, index: &str, body: &Value) -> Result<IndexStatus, SyncError> {
        (**self).ensure_index(index, body).await
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[Document],
    ) -> Result<BulkSummary, SyncError> {
        (**self).bulk_upsert(index, documents).await
    }
}
