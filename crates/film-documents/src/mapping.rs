//! Index settings and mappings for the movies index.

use serde_json::Value;
use sync_core::{Origin, SyncError};

/// Index body sent verbatim when the movies index is created.
pub const MOVIES_INDEX_MAPPING: &str = include_str!("../mappings/movies.json");

/// Parsed movies index body.
pub fn movies_index_mapping() -> Result<Value, SyncError> {
    serde_json::from_str(MOVIES_INDEX_MAPPING).map_err(|e| SyncError::integrity(Origin::Index, e))
}
