//! One sync pass for one entity.
//!
//! A pass moves through these states:
//!
//! ```text
//! Seeding ──> Extracting ──> Assembling ──> Writing
//!   (only if      │   ^                        │
//!   no watermark) │   └────────────────────────┘
//!                 v
//!                Done
//! ```
//!
//! The watermark is advanced to the last row of every fetched chunk before
//! that chunk is assembled and written. Once the write succeeds the
//! entity's written mark catches up. If the process dies in between, the
//! next pass starts from the written mark and fetches the chunk again;
//! replaying it is harmless because upserts are idempotent.

use chrono::{DateTime, Duration, Utc};
use elasticsearch_sink::IndexSink;
use sync_core::{ChangeSource, EntityKind, SyncError};
use tracing::{debug, info};
use watermark::{codec, WatermarkBackend};

use crate::connect::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Seeding,
    Extracting,
    Assembling,
    Writing,
    Done,
}

/// What one pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct PassStats {
    pub entity: EntityKind,
    pub chunks: usize,
    pub rows: usize,
    pub documents: usize,
    /// Watermark in effect when the pass finished; None when the entity's
    /// table was empty and nothing was seeded.
    pub watermark: Option<DateTime<Utc>>,
}

impl PassStats {
    fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            chunks: 0,
            rows: 0,
            documents: 0,
            watermark: None,
        }
    }
}

fn enter(entity: EntityKind, state: PassState) {
    debug!("{entity}: {state:?}");
}

/// Drain every pending change of `entity` into `index`.
pub async fn run_pass<S, B, I>(
    session: &mut Session<S, B, I>,
    index: &str,
    entity: EntityKind,
) -> Result<PassStats, SyncError>
where
    S: ChangeSource,
    B: WatermarkBackend,
    I: IndexSink,
{
    let Session {
        source,
        watermarks,
        sink,
    } = session;
    let mut stats = PassStats::new(entity);

    let (mut committed, from) = match watermarks.resume(entity).await? {
        Some(resume) => (resume.committed, resume.from),
        None => {
            enter(entity, PassState::Seeding);
            let Some(first) = source.first_modified(entity).await? else {
                info!("{entity}: table is empty, nothing to sync");
                enter(entity, PassState::Done);
                return Ok(stats);
            };
            // Strictly below the oldest row so the first pass includes it.
            let seeded = first - Duration::microseconds(1);
            watermarks.set_written(entity, seeded).await?;
            watermarks.set(entity, seeded).await?;
            info!("{entity}: seeded watermark at {}", codec::encode(seeded));
            (seeded, seeded)
        }
    };

    enter(entity, PassState::Extracting);
    let mut cursor = source.open_pass(entity, from).await?;

    loop {
        let chunk = cursor.next_chunk().await?;
        let Some(last) = chunk.last() else {
            break;
        };
        let chunk_end = last.modified;
        stats.chunks += 1;
        stats.rows += chunk.len();
        debug!("{entity}: fetched {} rows", chunk.len());

        // Chunks replayed after an interrupted write end at or below the
        // committed watermark.
        if chunk_end > committed {
            committed = watermarks.advance(entity, committed, chunk_end).await?;
        }

        enter(entity, PassState::Assembling);
        let documents = film_documents::assemble(entity, &chunk)?;

        enter(entity, PassState::Writing);
        sink.bulk_upsert(index, &documents).await?;
        watermarks.set_written(entity, chunk_end).await?;
        stats.documents += documents.len();

        enter(entity, PassState::Extracting);
    }

    cursor.close().await?;
    enter(entity, PassState::Done);

    stats.watermark = Some(committed);
    if stats.rows > 0 {
        info!(
            "{entity}: synced {} rows in {} chunks into {} documents, watermark {}",
            stats.rows,
            stats.chunks,
            stats.documents,
            codec::encode(committed)
        );
    } else {
        debug!("{entity}: no changes since {}", codec::encode(committed));
    }
    Ok(stats)
}
