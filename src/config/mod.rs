//! Command-line and environment configuration.

pub mod duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use pg_es_sync_postgresql_source::{queries::is_plain_identifier, SourceOpts};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use crate::poll::{Backoff, PollOptions};
use duration::parse_duration;

/// Where watermarks are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatermarkStorage {
    Redis,
    Filesystem,
}

/// PostgreSQL source options
#[derive(Parser, Clone)]
pub struct PostgresOpts {
    /// Source database name
    #[arg(long, default_value = "movies", env = "DB_NAME")]
    pub db_name: String,

    /// Source database user
    #[arg(long, default_value = "postgres", env = "DB_USER")]
    pub db_user: String,

    /// Source database password
    #[arg(long, default_value = "password", env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: String,

    /// Source database host
    #[arg(long, default_value = "db", env = "DB_HOST")]
    pub db_host: String,

    /// Source database port
    #[arg(long, default_value_t = 5432, env = "DB_PORT")]
    pub db_port: u16,

    /// Schema holding the movies tables
    #[arg(long, default_value = "content", env = "DB_SCHEMA")]
    pub db_schema: String,

    /// Maximum number of rows fetched per chunk
    #[arg(long, default_value_t = 10, env = "CHUNK_SIZE")]
    pub chunk_size: usize,
}

/// Elasticsearch target options
#[derive(Parser, Clone)]
pub struct ElasticOpts {
    /// Elasticsearch host, with or without scheme
    #[arg(long, default_value = "http://elasticsearch", env = "ELC_HOST")]
    pub elastic_host: String,

    /// Elasticsearch HTTP port
    #[arg(long, default_value_t = 9200, env = "ELK_PORT")]
    pub elastic_port: u16,

    /// Target index name
    #[arg(long, default_value = "movies", env = "INDEX_NAME")]
    pub index_name: String,
}

/// Watermark storage options
#[derive(Parser, Clone)]
pub struct WatermarkOpts {
    /// Watermark storage backend
    #[arg(long, value_enum, default_value = "redis", env = "WATERMARK_STORAGE")]
    pub watermark_storage: WatermarkStorage,

    /// Redis host (redis storage)
    #[arg(long, default_value = "redis", env = "REDIS_HOST")]
    pub redis_host: String,

    /// Redis port (redis storage)
    #[arg(long, default_value_t = 6379, env = "REDIS_PORT")]
    pub redis_port: u16,

    /// Directory for watermark files (filesystem storage)
    #[arg(long, default_value = ".pg-es-sync-watermarks", env = "WATERMARK_DIR")]
    pub watermark_dir: PathBuf,
}

/// Poll loop and retry options
#[derive(Parser, Clone)]
pub struct LoopOpts {
    /// Pause between sync rounds (e.g. "10s", "500ms", "1m")
    #[arg(long, default_value = "10s", env = "POLLING_TIME", value_parser = parse_duration)]
    pub poll_interval: Duration,

    /// First retry delay after a transient failure
    #[arg(long, default_value = "100ms", env = "BACKOFF_BASE", value_parser = parse_duration)]
    pub backoff_base: Duration,

    /// Multiplier applied to the retry delay after each consecutive failure
    #[arg(long, default_value_t = 2.0, env = "BACKOFF_FACTOR")]
    pub backoff_factor: f64,

    /// Upper bound of the retry delay
    #[arg(long, default_value = "10s", env = "BACKOFF_CAP", value_parser = parse_duration)]
    pub backoff_cap: Duration,

    /// Give up after this many consecutive transient failures (default: never)
    #[arg(long, env = "MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Run a single round and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Parser, Clone)]
#[command(name = "pg-es-sync")]
#[command(about = "Incrementally sync film documents from PostgreSQL to Elasticsearch")]
#[command(long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub postgres: PostgresOpts,

    #[command(flatten)]
    pub elastic: ElasticOpts,

    #[command(flatten)]
    pub watermark: WatermarkOpts,

    #[command(flatten)]
    pub poll: LoopOpts,

    /// Read from PostgreSQL but keep watermarks and documents in memory
    #[arg(long)]
    pub dry_run: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Reject option combinations clap cannot check on its own.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.postgres.chunk_size == 0 {
            anyhow::bail!("--chunk-size must be at least 1");
        }
        if i32::try_from(self.postgres.chunk_size).is_err() {
            anyhow::bail!("--chunk-size must not exceed {}", i32::MAX);
        }
        if !is_plain_identifier(&self.postgres.db_schema) {
            anyhow::bail!(
                "--db-schema must be a plain SQL identifier, got '{}'",
                self.postgres.db_schema
            );
        }
        if !self.poll.backoff_factor.is_finite() || self.poll.backoff_factor < 1.0 {
            anyhow::bail!(
                "--backoff-factor must be at least 1, got {}",
                self.poll.backoff_factor
            );
        }
        if self.poll.backoff_cap < self.poll.backoff_base {
            anyhow::bail!("--backoff-cap must not be smaller than --backoff-base");
        }
        if self.elastic.index_name.is_empty()
            || self.elastic.index_name.contains(['/', ' ', '*', '?', '"', '<', '>', '|', ','])
        {
            anyhow::bail!("Invalid index name: '{}'", self.elastic.index_name);
        }
        Ok(())
    }

    pub fn source_opts(&self) -> SourceOpts {
        SourceOpts {
            host: self.postgres.db_host.clone(),
            port: self.postgres.db_port,
            user: self.postgres.db_user.clone(),
            password: self.postgres.db_password.clone(),
            dbname: self.postgres.db_name.clone(),
            schema: self.postgres.db_schema.clone(),
            chunk_size: self.postgres.chunk_size,
        }
    }

    /// Elasticsearch base URL; `http://` is assumed when the host has no scheme.
    pub fn elastic_url(&self) -> String {
        let host = self.elastic.elastic_host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}:{}", self.elastic.elastic_port)
        } else {
            format!("http://{host}:{}", self.elastic.elastic_port)
        }
    }

    pub fn redis_url(&self) -> String {
        format!(
            "redis://{}:{}/",
            self.watermark.redis_host, self.watermark.redis_port
        )
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            base: self.poll.backoff_base,
            factor: self.poll.backoff_factor,
            cap: self.poll.backoff_cap,
        }
    }

    pub fn poll_options(&self, mapping: Value) -> PollOptions {
        PollOptions {
            index: self.elastic.index_name.clone(),
            mapping,
            poll_interval: self.poll.poll_interval,
            backoff: self.backoff(),
            max_rounds: self.poll.once.then_some(1),
            max_retries: self.poll.max_retries,
        }
    }

    /// Parse from `args`, then validate.
    pub fn try_from_args<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Self::try_parse_from(args).context("Invalid command line")?;
        config.validate()?;
        Ok(config)
    }
}
