//! Change extraction traits.
//!
//! A [`ChangeSource`] opens one [`ChangeCursor`] per sync pass. The cursor
//! yields rows with `modified > watermark` in ascending `modified` order, in
//! chunks of at most the source's chunk size. An empty chunk means the pass
//! is drained.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entity::EntityKind;
use crate::error::SyncError;
use crate::row::SourceRow;

/// Source of changed rows for every entity kind.
#[async_trait]
pub trait ChangeSource: Send {
    /// Smallest `modified` value in the entity's table, or `None` when the
    /// table is empty.
    async fn first_modified(&mut self, entity: EntityKind)
        -> Result<Option<DateTime<Utc>>, SyncError>;

    /// Open a cursor over the rows of `entity` modified after `watermark`.
    ///
    /// The cursor borrows the source for the whole pass; only one pass can
    /// be open at a time.
    async fn open_pass<'a>(
        &'a mut self,
        entity: EntityKind,
        watermark: DateTime<Utc>,
    ) -> Result<Box<dyn ChangeCursor + 'a>, SyncError>;
}

/// An open, forward-only cursor over one pass.
#[async_trait]
pub trait ChangeCursor: Send {
    /// Fetch the next bounded chunk. Empty when the pass is complete.
    async fn next_chunk(&mut self) -> Result<Vec<SourceRow>, SyncError>;

    /// Release the cursor. Dropping a cursor without closing it abandons it.
    async fn close(self: Box<Self>) -> Result<(), SyncError>;
}
