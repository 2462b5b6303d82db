//! Index-ready documents.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Origin, SyncError};

/// A (possibly partial) document to upsert into the search index.
///
/// `fields` are merged onto whatever is already stored under `id`; fields
/// not present here are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a document from any serializable struct that serializes to a
    /// JSON object.
    pub fn from_body<T: Serialize>(id: impl Into<String>, body: &T) -> Result<Self, SyncError> {
        let id = id.into();
        match serde_json::to_value(body) {
            Ok(Value::Object(fields)) => Ok(Self { id, fields }),
            Ok(other) => Err(SyncError::integrity(
                Origin::Assembler,
                format!("Document '{id}' body is not an object: {other}"),
            )),
            Err(e) => Err(SyncError::integrity(Origin::Assembler, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Genres {
        genres: Vec<String>,
    }

    #[test]
    fn test_from_body() {
        let doc = Document::from_body(
            "f1",
            &Genres {
                genres: vec!["Drama".to_string()],
            },
        )
        .unwrap();
        assert_eq!(doc.id, "f1");
        assert_eq!(doc.fields["genres"], serde_json::json!(["Drama"]));
    }

    #[test]
    fn test_non_object_body_is_rejected() {
        let err = Document::from_body("f1", &vec![1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }
}
