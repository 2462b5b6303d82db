//! PostgreSQL change extraction for pg-es-sync
//!
//! Reads rows whose `modified` column is newer than a watermark from the
//! movies schema (`film_work`, `person`, `genre` and their link tables).
//! Each pass runs inside a read-only transaction and pages through one
//! server-side portal with bounded fetches, so rows are never skipped or
//! repeated within a pass even when new rows become eligible mid-pass.

mod client;
pub mod error;
pub mod queries;
mod source;
pub mod value;

pub use client::new_postgresql_client;
pub use error::classify;
pub use source::PostgresChangeSource;

/// PostgreSQL source connection options
#[derive(Clone, Debug)]
pub struct SourceOpts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// Schema holding the movies tables
    pub schema: String,
    /// Maximum number of rows per fetched chunk
    pub chunk_size: usize,
}
