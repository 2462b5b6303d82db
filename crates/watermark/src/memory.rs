//! In-process watermark storage.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use sync_core::SyncError;
use tokio::sync::Mutex;

use crate::store::WatermarkBackend;

/// Most recent writes kept in the history log.
const HISTORY_KEPT: usize = 1024;

/// In-memory implementation of WatermarkBackend trait.
///
/// Cloning shares the underlying map, so a test can keep a handle while the
/// sync engine owns another. Recent writes are also kept in a history log.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, String>,
    history: VecDeque<(String, String)>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of every key.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.inner.lock().await.values.clone()
    }

    /// Recent writes, oldest first.
    pub async fn history(&self) -> Vec<(String, String)> {
        self.inner.lock().await.history.iter().cloned().collect()
    }
}

#[async_trait]
impl WatermarkBackend for MemoryBackend {
    async fn read_raw(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self.inner.lock().await.values.get(key).cloned())
    }

    async fn write_raw(&self, key: &str, value: String) -> Result<(), SyncError> {
        let mut inner = self.inner.lock().await;
        if inner.history.len() == HISTORY_KEPT {
            inner.history.pop_front();
        }
        inner.history.push_back((key.to_string(), value.clone()));
        inner.values.insert(key.to_string(), value);
        Ok(())
    }
}
