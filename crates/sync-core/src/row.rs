//! Raw changed rows produced by a change extractor.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{Origin, SyncError};

/// Separator between the parts of a packed aggregate element
/// (`role*name*id`).
pub const PACKED_FIELD_DELIMITER: char = '*';

/// One row of a change query result.
///
/// `modified` is lifted out of the row so the orchestrator can advance the
/// watermark without knowing the entity's shape; every other column is kept
/// as a JSON value keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub modified: DateTime<Utc>,
    pub columns: Map<String, Value>,
}

impl SourceRow {
    pub fn new(modified: DateTime<Utc>) -> Self {
        Self {
            modified,
            columns: Map::new(),
        }
    }

    /// Builder-style column setter.
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.insert(column.to_string(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// A required, non-null string column.
    pub fn required_str(&self, column: &str) -> Result<&str, SyncError> {
        match self.columns.get(column) {
            Some(Value::String(s)) => Ok(s),
            Some(Value::Null) | None => Err(missing(column)),
            Some(other) => Err(mismatch(column, "string", other)),
        }
    }

    /// A nullable string column. A missing column reads as null.
    pub fn optional_str(&self, column: &str) -> Result<Option<&str>, SyncError> {
        match self.columns.get(column) {
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(mismatch(column, "string", other)),
        }
    }

    /// A nullable numeric column. A missing column reads as null.
    pub fn optional_f64(&self, column: &str) -> Result<Option<f64>, SyncError> {
        match self.columns.get(column) {
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| mismatch(column, "float", &Value::Number(n.clone()))),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(mismatch(column, "number", other)),
        }
    }

    /// An array column. A missing or null column reads as an empty array;
    /// elements are returned as-is so callers can reject nulls.
    pub fn array(&self, column: &str) -> Result<&[Value], SyncError> {
        match self.columns.get(column) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(&[]),
            Some(other) => Err(mismatch(column, "array", other)),
        }
    }
}

fn missing(column: &str) -> SyncError {
    SyncError::integrity(
        Origin::Assembler,
        format!("Required column '{column}' is missing or null"),
    )
}

fn mismatch(column: &str, expected: &str, actual: &Value) -> SyncError {
    SyncError::integrity(
        Origin::Assembler,
        format!("Column '{column}' type mismatch: expected {expected}, got {actual}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn row() -> SourceRow {
        SourceRow::new(Utc::now())
            .with("title", "Star Wars")
            .with("description", Value::Null)
            .with("rating", 8.6)
            .with("genres", json!(["Action", "Sci-Fi"]))
    }

    #[test]
    fn test_required_str() {
        assert_eq!(row().required_str("title").unwrap(), "Star Wars");
        let err = row().required_str("description").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(err.to_string().contains("'description'"));
    }

    #[test]
    fn test_optional_columns_default_to_none() {
        let row = row();
        assert_eq!(row.optional_str("description").unwrap(), None);
        assert_eq!(row.optional_str("absent").unwrap(), None);
        assert_eq!(row.optional_f64("rating").unwrap(), Some(8.6));
        assert_eq!(row.optional_f64("absent").unwrap(), None);
    }

    #[test]
    fn test_type_mismatch_is_integrity_error() {
        let err = row().optional_f64("title").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(err.to_string().contains("expected number"));
    }

    #[test]
    fn test_array_defaults_to_empty() {
        let row = row();
        assert_eq!(row.array("genres").unwrap().len(), 2);
        assert!(row.array("persons").unwrap().is_empty());
        assert!(row.array("title").is_err());
    }
}
