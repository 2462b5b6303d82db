//! pg-es-sync library
//!
//! Keeps an Elasticsearch index of film documents in step with a PostgreSQL
//! movies database. Changes are found by each table's `modified` column
//! against a per-entity watermark, so restarts resume where they left off.
//!
//! # Architecture
//!
//! ```text
//! poll::run ── round ──> loader::run_pass (film_work, person, genre)
//!                           │
//!                           ├─ ChangeSource   (PostgreSQL, chunked)
//!                           ├─ film_documents (rows -> documents)
//!                           ├─ IndexSink      (bulk upsert)
//!                           └─ WatermarkManager (Redis / files)
//! ```
//!
//! - [`poll`] runs rounds forever, retrying transient failures with
//!   exponential backoff over a fresh [`connect::Session`]
//! - [`loader`] drains one entity's changes chunk by chunk
//!
//! # CLI Usage
//!
//! ```bash
//! # Sync every 10 seconds using Redis for watermarks
//! pg-es-sync --db-host localhost --elastic-host http://localhost --redis-host localhost
//!
//! # One round, watermarks in files
//! pg-es-sync --once --watermark-storage filesystem --watermark-dir /var/lib/pg-es-sync
//!
//! # Read PostgreSQL but keep everything else in memory
//! RUST_LOG=debug pg-es-sync --dry-run --once
//! ```

pub mod config;
pub mod connect;
pub mod loader;
pub mod poll;
pub mod testing;

pub use config::Config;
pub use connect::{Connector, ServiceConnector, Session};
pub use loader::{run_pass, PassState, PassStats};
pub use poll::{run, Backoff, PollOptions, RoundStats, RunSummary};
