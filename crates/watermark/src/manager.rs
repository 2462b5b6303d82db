//! Typed watermark access.

use chrono::{DateTime, Utc};
use sync_core::{EntityKind, SyncError};

use crate::codec;
use crate::store::WatermarkBackend;

/// Manager for reading and advancing per-entity watermarks.
///
/// # Example
///
/// ```rust,ignore
/// use watermark::{MemoryBackend, WatermarkManager};
///
/// let manager = WatermarkManager::new(MemoryBackend::new());
/// manager.set(EntityKind::FilmWork, seeded).await?;
/// let current = manager.get(EntityKind::FilmWork).await?;
/// ```
pub struct WatermarkManager<B> {
    backend: B,
}

impl<B: WatermarkBackend> WatermarkManager<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Read the watermark for `entity`.
    ///
    /// Returns None if no watermark was ever stored, which is distinct from
    /// any real instant.
    pub async fn get(&self, entity: EntityKind) -> Result<Option<DateTime<Utc>>, SyncError> {
        match self.backend.read_raw(entity.watermark_key()).await? {
            Some(raw) => Ok(Some(codec::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Store the watermark for `entity` unconditionally.
    pub async fn set(&self, entity: EntityKind, at: DateTime<Utc>) -> Result<(), SyncError> {
        let encoded = codec::encode(at);
        self.backend
            .write_raw(entity.watermark_key(), encoded.clone())
            .await?;
        tracing::debug!("Stored {} watermark: {}", entity, encoded);
        Ok(())
    }

    /// Move the watermark for `entity` from `current` to `candidate`.
    ///
    /// A candidate older than `current` is ignored: watermarks never move
    /// backwards. Returns the watermark in effect afterwards.
    pub async fn advance(
        &self,
        entity: EntityKind,
        current: DateTime<Utc>,
        candidate: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SyncError> {
        if candidate < current {
            tracing::warn!(
                "Refusing to move {} watermark backwards from {} to {}",
                entity,
                codec::encode(current),
                codec::encode(candidate)
            );
            return Ok(current);
        }
        if candidate > current {
            self.set(entity, candidate).await?;
        }
        Ok(candidate)
    }

    /// Read the instant up to which every fetched change of `entity` is
    /// known to be written to the index.
    pub async fn get_written(&self, entity: EntityKind) -> Result<Option<DateTime<Utc>>, SyncError> {
        match self.backend.read_raw(&written_key(entity)).await? {
            Some(raw) => Ok(Some(codec::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Record that every change of `entity` up to `at` is in the index.
    pub async fn set_written(&self, entity: EntityKind, at: DateTime<Utc>) -> Result<(), SyncError> {
        self.backend
            .write_raw(&written_key(entity), codec::encode(at))
            .await
    }

    /// Where the next pass for `entity` starts.
    ///
    /// Normally this is the watermark. When a previous pass committed the
    /// watermark for a chunk but stopped before writing it, the pass starts
    /// from the written mark instead so the chunk is fetched again.
    /// Returns None if no watermark was ever stored.
    pub async fn resume(&self, entity: EntityKind) -> Result<Option<Resume>, SyncError> {
        let Some(committed) = self.get(entity).await? else {
            return Ok(None);
        };

        let from = match self.get_written(entity).await? {
            Some(written) if written < committed => {
                tracing::info!(
                    "Replaying {} changes from {}: watermark {} was committed before its write finished",
                    entity,
                    codec::encode(written),
                    codec::encode(committed)
                );
                written
            }
            Some(_) => committed,
            None => {
                // Watermark written by a loader without a written mark.
                self.set_written(entity, committed).await?;
                committed
            }
        };

        Ok(Some(Resume { committed, from }))
    }
}

/// Starting point of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resume {
    /// Stored watermark: changes up to here were fetched.
    pub committed: DateTime<Utc>,
    /// Changes after this instant are fetched by the pass; never later
    /// than `committed`.
    pub from: DateTime<Utc>,
}

fn written_key(entity: EntityKind) -> String {
    format!("{}_written", entity.watermark_key())
}
