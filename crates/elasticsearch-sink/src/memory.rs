//! In-process search index.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use sync_core::{Document, SyncError};
use tokio::sync::Mutex;

use crate::traits::{BulkSummary, IndexSink, IndexStatus};

/// Most recent bulk sizes kept; a long `--dry-run` must not grow without bound.
const BULK_SIZES_KEPT: usize = 1024;

/// In-memory implementation of the IndexSink trait.
///
/// Applies the same merge semantics as a `doc_as_upsert` update. Cloning
/// shares the stored state, so tests can inspect what the engine wrote.
#[derive(Clone, Default)]
pub struct MemoryIndex {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    indices: HashMap<String, StoredIndex>,
    bulk_sizes: VecDeque<usize>,
}

#[derive(Default)]
struct StoredIndex {
    body: Option<Value>,
    documents: BTreeMap<String, Map<String, Value>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn exists(&self, index: &str) -> bool {
        self.inner.lock().await.indices.contains_key(index)
    }

    /// Body the index was created with, if it was created explicitly.
    pub async fn index_body(&self, index: &str) -> Option<Value> {
        self.inner
            .lock()
            .await
            .indices
            .get(index)
            .and_then(|i| i.body.clone())
    }

    pub async fn document(&self, index: &str, id: &str) -> Option<Map<String, Value>> {
        self.inner
            .lock()
            .await
            .indices
            .get(index)
            .and_then(|i| i.documents.get(id).cloned())
    }

    /// All stored documents, ordered by id.
    pub async fn documents(&self, index: &str) -> BTreeMap<String, Map<String, Value>> {
        self.inner
            .lock()
            .await
            .indices
            .get(index)
            .map(|i| i.documents.clone())
            .unwrap_or_default()
    }

    /// Number of documents in each recent non-empty bulk request, oldest
    /// first.
    pub async fn bulk_sizes(&self) -> Vec<usize> {
        self.inner.lock().await.bulk_sizes.iter().copied().collect()
    }
}

#[async_trait::async_trait]
impl IndexSink for MemoryIndex {
    async fn ensure_index(&self, index: &str, body: &Value) -> Result<IndexStatus, SyncError> {
        let mut inner = self.inner.lock().await;
        if inner.indices.contains_key(index) {
            return Ok(IndexStatus::AlreadyExists);
        }
        inner.indices.insert(
            index.to_string(),
            StoredIndex {
                body: Some(body.clone()),
                documents: BTreeMap::new(),
            },
        );
        Ok(IndexStatus::Created)
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[Document],
    ) -> Result<BulkSummary, SyncError> {
        if documents.is_empty() {
            return Ok(BulkSummary::default());
        }

        let mut inner = self.inner.lock().await;
        if inner.bulk_sizes.len() == BULK_SIZES_KEPT {
            inner.bulk_sizes.pop_front();
        }
        inner.bulk_sizes.push_back(documents.len());
        // Writing to a missing index creates it, as Elasticsearch does.
        let stored = inner.indices.entry(index.to_string()).or_default();

        let mut summary = BulkSummary::default();
        for doc in documents {
            let body = Value::Object(doc.fields.clone());
            tracing::debug!("Upsert {index}/{}: {body}", doc.id);
            match stored.documents.get_mut(&doc.id) {
                Some(existing) => {
                    let before = existing.clone();
                    for (field, value) in &doc.fields {
                        existing.insert(field.clone(), value.clone());
                    }
                    if *existing == before {
                        summary.noop += 1;
                    } else {
                        summary.updated += 1;
                    }
                }
                None => {
                    stored.documents.insert(doc.id.clone(), doc.fields.clone());
                    summary.created += 1;
                }
            }
        }
        Ok(summary)
    }
}
