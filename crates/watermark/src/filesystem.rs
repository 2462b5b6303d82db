//! Filesystem-based watermark storage implementation.

use async_trait::async_trait;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use sync_core::{Origin, SyncError};

use crate::store::WatermarkBackend;

/// Filesystem implementation of WatermarkBackend trait.
///
/// Stores each watermark as `<dir>/<key>.watermark`. Writes go to a
/// temporary file first and are renamed into place, so a reader never sees
/// a partially written value.
pub struct FilesystemBackend {
    dir: PathBuf,
}

impl FilesystemBackend {
    /// Create a new FilesystemBackend with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.watermark"))
    }
}

#[async_trait]
impl WatermarkBackend for FilesystemBackend {
    async fn read_raw(&self, key: &str) -> Result<Option<String>, SyncError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(classify(e)),
        }
    }

    async fn write_raw(&self, key: &str, value: String) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(classify)?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.watermark.tmp"));
        tokio::fs::write(&tmp, value.as_bytes())
            .await
            .map_err(classify)?;
        tokio::fs::rename(&tmp, &path).await.map_err(classify)?;

        tracing::trace!("Stored watermark to {}", path.display());
        Ok(())
    }
}

fn classify(e: std::io::Error) -> SyncError {
    match e.kind() {
        IoErrorKind::InvalidData => SyncError::integrity(Origin::Watermark, e),
        _ => SyncError::transient(Origin::Watermark, e),
    }
}
