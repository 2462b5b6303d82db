//! Watermark management for pg-es-sync
//!
//! A watermark is the most recent `modified` timestamp already processed for
//! one entity kind. This crate persists one watermark per kind and resumes
//! from it after restarts.
//!
//! # Architecture
//!
//! - [`WatermarkBackend`] - raw string key/value persistence
//! - [`WatermarkManager`] - typed access on top of a backend: encodes
//!   instants as ISO-8601 strings, keys them by entity name, and refuses to
//!   move a watermark backwards. Next to each watermark it keeps a
//!   "written" mark (`<entity>_written`) so a chunk whose watermark was
//!   committed but whose documents never reached the index is fetched again
//!
//! ## Storage Backends
//!
//! - [`RedisBackend`] - `GET`/`MSET` against Redis (the default)
//! - [`FilesystemBackend`] - one file per key in a directory
//! - [`MemoryBackend`] - in-process map, for tests and dry runs

pub mod codec;
mod filesystem;
mod manager;
mod memory;
mod redis_store;
pub mod store;

#[cfg(test)]
mod tests;

pub use filesystem::FilesystemBackend;
pub use manager::{Resume, WatermarkManager};
pub use memory::MemoryBackend;
pub use redis_store::RedisBackend;
pub use store::WatermarkBackend;
