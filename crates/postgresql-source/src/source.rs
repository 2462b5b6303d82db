//! PostgreSQL implementation of the change extraction traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sync_core::{ChangeCursor, ChangeSource, EntityKind, Origin, SourceRow, SyncError};
use tokio_postgres::{Client, Portal, Transaction};
use tracing::debug;

use crate::error::classify;
use crate::{queries, value, SourceOpts};

/// Change source reading from the movies schema over one client connection.
pub struct PostgresChangeSource {
    client: Client,
    schema: String,
    chunk_size: i32,
}

impl PostgresChangeSource {
    pub fn new(client: Client, schema: impl Into<String>, chunk_size: usize) -> Result<Self, SyncError> {
        let schema = schema.into();
        if !queries::is_plain_identifier(&schema) {
            return Err(SyncError::integrity(
                Origin::Source,
                format!("Invalid schema name: '{schema}'"),
            ));
        }
        let chunk_size = i32::try_from(chunk_size)
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                SyncError::integrity(
                    Origin::Source,
                    format!("Chunk size must be between 1 and {}, got {chunk_size}", i32::MAX),
                )
            })?;

        Ok(Self {
            client,
            schema,
            chunk_size,
        })
    }

    /// Connect using `opts` and build a source over the new client.
    pub async fn connect(opts: &SourceOpts) -> Result<Self, SyncError> {
        let client = crate::new_postgresql_client(opts).await?;
        Self::new(client, opts.schema.clone(), opts.chunk_size)
    }
}

#[async_trait]
impl ChangeSource for PostgresChangeSource {
    async fn first_modified(
        &mut self,
        entity: EntityKind,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        let sql = queries::first_modified(&self.schema, entity);
        let row = self.client.query_one(&sql, &[]).await.map_err(classify)?;
        value::read_modified(&row, 0)
    }

    async fn open_pass<'a>(
        &'a mut self,
        entity: EntityKind,
        watermark: DateTime<Utc>,
    ) -> Result<Box<dyn ChangeCursor + 'a>, SyncError> {
        let sql = queries::select_changes(&self.schema, entity);
        let chunk_size = self.chunk_size;

        let transaction = self
            .client
            .build_transaction()
            .read_only(true)
            .start()
            .await
            .map_err(classify)?;
        let statement = transaction.prepare(&sql).await.map_err(classify)?;
        let portal = transaction
            .bind(&statement, &[&watermark])
            .await
            .map_err(classify)?;

        debug!("Opened {} change portal", entity);

        Ok(Box::new(PostgresCursor {
            transaction,
            portal,
            chunk_size,
            entity,
        }))
    }
}

/// One pass over a bound portal inside a read-only transaction.
struct PostgresCursor<'a> {
    transaction: Transaction<'a>,
    portal: Portal,
    chunk_size: i32,
    entity: EntityKind,
}

#[async_trait]
impl<'a> ChangeCursor for PostgresCursor<'a> {
    async fn next_chunk(&mut self) -> Result<Vec<SourceRow>, SyncError> {
        let rows = self
            .transaction
            .query_portal(&self.portal, self.chunk_size)
            .await
            .map_err(classify)?;

        debug!("Fetched {} {} rows", rows.len(), self.entity);

        rows.iter().map(value::to_source_row).collect()
    }

    async fn close(self: Box<Self>) -> Result<(), SyncError> {
        let PostgresCursor {
            transaction,
            portal,
            entity,
            ..
        } = *self;
        drop(portal);
        transaction.commit().await.map_err(classify)?;
        debug!("Closed {} change portal", entity);
        Ok(())
    }
}
