//! Core types for the pg-es-sync framework.
//!
//! This crate provides the foundational types shared by the source,
//! watermark, document and sink crates:
//!
//! - [`EntityKind`] - The independently tracked entity kinds
//! - [`SourceRow`] - One changed row as returned by a change extractor
//! - [`Document`] - An index-ready partial document keyed by film id
//! - [`SyncError`] - Typed failures carrying an [`ErrorKind`] classification
//! - [`ChangeSource`] / [`ChangeCursor`] - The change extraction seam
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── watermark            (persists per-entity watermarks)
//!    ├─── postgresql-source    (implements ChangeSource for PostgreSQL)
//!    ├─── film-documents       (SourceRow -> Document per entity)
//!    └─── elasticsearch-sink   (writes Documents to the search index)
//! ```

pub mod document;
pub mod entity;
pub mod error;
pub mod row;
pub mod source;

pub use document::Document;
pub use entity::EntityKind;
pub use error::{BoxError, ErrorKind, Origin, SyncError};
pub use row::{SourceRow, PACKED_FIELD_DELIMITER};
pub use source::{ChangeCursor, ChangeSource};
