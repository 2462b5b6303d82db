//! Watermark storage trait
//!
//! This module defines the WatermarkBackend trait for raw key/value
//! watermark storage.

use async_trait::async_trait;
use sync_core::SyncError;

/// Trait for watermark storage operations.
///
/// This trait abstracts the storage backend, allowing the same watermark
/// logic to work with:
/// - Redis (`RedisBackend`)
/// - Filesystem storage (`FilesystemBackend`)
/// - In-process memory (`MemoryBackend`)
///
/// Values are opaque strings here; encoding lives in
/// [`WatermarkManager`](crate::WatermarkManager).
#[async_trait]
pub trait WatermarkBackend: Send + Sync {
    /// Read the raw value stored under `key`.
    ///
    /// Returns None if the key has never been written.
    async fn read_raw(&self, key: &str) -> Result<Option<String>, SyncError>;

    /// Atomically replace the value stored under `key`.
    async fn write_raw(&self, key: &str, value: String) -> Result<(), SyncError>;
}

/// Lets a backend chosen at runtime be used wherever a concrete one is.
#[async_trait]
impl<T: WatermarkBackend + ?Sized> WatermarkBackend for Box<T> {
    async fn read_raw(&self, key: &str) -> Result<Option<String>, SyncError> {
        (**self).read_raw(key).await
    }

    async fn write_raw(&self, key: &str, value: String) -> Result<(), SyncError> {
        (**self).write_raw(key, value).await
    }
}
