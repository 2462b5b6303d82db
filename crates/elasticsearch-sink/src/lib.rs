//! Search index sink.
//!
//! Documents produced by the assembler are written with update-or-insert
//! semantics: each document's fields are merged onto the stored document
//! with the same id, or a new document is created. Writing the same batch
//! twice leaves the index unchanged, which is what makes replaying a chunk
//! after a crash safe.
//!
//! Two implementations are provided:
//!
//! - [`ElasticsearchSink`] talks to an Elasticsearch node over its REST API
//! - [`MemoryIndex`] keeps documents in process, used by dry runs and tests

pub mod bulk;
mod client;
pub mod error;
mod memory;
mod traits;

pub use client::ElasticsearchSink;
pub use error::IndexError;
pub use memory::MemoryIndex;
pub use traits::{BulkSummary, IndexSink, IndexStatus};
