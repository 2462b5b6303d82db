//! Connections to the source, the watermark store and the search index.

use async_trait::async_trait;
use elasticsearch_sink::{ElasticsearchSink, IndexSink, MemoryIndex};
use pg_es_sync_postgresql_source::{PostgresChangeSource, SourceOpts};
use std::path::PathBuf;
use sync_core::{ChangeSource, SyncError};
use tracing::info;
use watermark::{
    FilesystemBackend, MemoryBackend, RedisBackend, WatermarkBackend, WatermarkManager,
};

use crate::config::{Config, WatermarkStorage};

/// One set of live connections, reused across entities and rounds until a
/// transient failure drops it.
pub struct Session<S, B, I> {
    pub source: S,
    pub watermarks: WatermarkManager<B>,
    pub sink: I,
}

impl<S, B, I> Session<S, B, I> {
    pub fn new(source: S, watermarks: WatermarkManager<B>, sink: I) -> Self {
        Self {
            source,
            watermarks,
            sink,
        }
    }
}

/// Opens sessions for the poll loop. Called again after every transient
/// failure.
#[async_trait]
pub trait Connector: Send {
    type Source: ChangeSource;
    type Backend: WatermarkBackend;
    type Sink: IndexSink;

    async fn connect(
        &mut self,
    ) -> Result<Session<Self::Source, Self::Backend, Self::Sink>, SyncError>;
}

enum WatermarkTarget {
    Redis(String),
    Filesystem(PathBuf),
    Memory(MemoryBackend),
}

enum IndexTarget {
    Elasticsearch(String),
    Memory(MemoryIndex),
}

/// Connector for a running service: PostgreSQL source, Redis or filesystem
/// watermarks, Elasticsearch sink.
///
/// In dry-run mode watermarks and documents live in memory instead. The
/// in-memory stores are shared by every session so a reconnect does not
/// lose them.
pub struct ServiceConnector {
    source: SourceOpts,
    watermarks: WatermarkTarget,
    index: IndexTarget,
}

impl ServiceConnector {
    pub fn from_config(config: &Config) -> Self {
        let (watermarks, index) = if config.dry_run {
            (
                WatermarkTarget::Memory(MemoryBackend::new()),
                IndexTarget::Memory(MemoryIndex::new()),
            )
        } else {
            let watermarks = match config.watermark.watermark_storage {
                WatermarkStorage::Redis => WatermarkTarget::Redis(config.redis_url()),
                WatermarkStorage::Filesystem => {
                    WatermarkTarget::Filesystem(config.watermark.watermark_dir.clone())
                }
            };
            (watermarks, IndexTarget::Elasticsearch(config.elastic_url()))
        };

        Self {
            source: config.source_opts(),
            watermarks,
            index,
        }
    }
}

#[async_trait]
impl Connector for ServiceConnector {
    type Source = PostgresChangeSource;
    type Backend = Box<dyn WatermarkBackend>;
    type Sink = Box<dyn IndexSink>;

    async fn connect(
        &mut self,
    ) -> Result<Session<Self::Source, Self::Backend, Self::Sink>, SyncError> {
        let source = PostgresChangeSource::connect(&self.source).await?;

        let backend: Box<dyn WatermarkBackend> = match &self.watermarks {
            WatermarkTarget::Redis(url) => Box::new(RedisBackend::connect(url).await?),
            WatermarkTarget::Filesystem(dir) => {
                info!("Using watermark directory {}", dir.display());
                Box::new(FilesystemBackend::new(dir.clone()))
            }
            WatermarkTarget::Memory(backend) => Box::new(backend.clone()),
        };

        let sink: Box<dyn IndexSink> = match &self.index {
            IndexTarget::Elasticsearch(url) => Box::new(ElasticsearchSink::new(url)?),
            IndexTarget::Memory(index) => Box::new(index.clone()),
        };

        Ok(Session::new(source, WatermarkManager::new(backend), sink))
    }
}
