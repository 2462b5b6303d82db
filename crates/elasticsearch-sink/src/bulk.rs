//! Bulk API request bodies and responses.
//!
//! A bulk upsert is an NDJSON body with two lines per document:
//!
//! ```text
//! {"update":{"_index":"movies","_id":"f1"}}
//! {"doc":{"title":"The Star"},"doc_as_upsert":true}
//! ```

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use sync_core::{Document, Origin, SyncError};

use crate::error::{classify_status, is_retryable_status, IndexError};
use crate::traits::BulkSummary;

/// Build the NDJSON body for upserting `documents` into `index`.
///
/// The body always ends with a newline, as the bulk endpoint requires.
pub fn upsert_body(index: &str, documents: &[Document]) -> Result<String, SyncError> {
    let mut body = String::new();
    for doc in documents {
        let action = json!({ "update": { "_index": index, "_id": doc.id } });
        let source = json!({ "doc": doc.fields, "doc_as_upsert": true });
        for line in [action, source] {
            let line =
                serde_json::to_string(&line).map_err(|e| SyncError::integrity(Origin::Index, e))?;
            body.push_str(&line);
            body.push('\n');
        }
    }
    Ok(body)
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: String,
    status: u16,
    result: Option<String>,
    error: Option<Value>,
}

/// Turn a bulk response into a summary, or into the error for the first
/// rejected document.
///
/// A response where every failed item was throttled is transient; any other
/// item failure means the document itself was refused.
pub fn parse_response(response: &Value, expected: usize) -> Result<BulkSummary, SyncError> {
    let parsed: BulkResponse = serde_json::from_value(response.clone()).map_err(|e| {
        SyncError::integrity(Origin::Index, IndexError::Response(e.to_string()))
    })?;

    if parsed.items.len() != expected {
        return Err(classify_status(IndexError::Response(format!(
            "expected {expected} items, got {}",
            parsed.items.len()
        ))));
    }

    let mut summary = BulkSummary::default();
    let mut throttled = None;

    for item in parsed.items.into_iter().flat_map(|entry| entry.into_values()) {
        if let Some(error) = item.error {
            let failure = IndexError::Item {
                id: item.id,
                status: item.status,
                reason: reason(&error),
            };
            if is_retryable_status(item.status) {
                throttled.get_or_insert(failure);
                continue;
            }
            return Err(classify_status(failure));
        }
        match item.result.as_deref() {
            Some("created") => summary.created += 1,
            Some("noop") => summary.noop += 1,
            _ => summary.updated += 1,
        }
    }

    if let Some(failure) = throttled {
        return Err(classify_status(failure));
    }
    if parsed.errors {
        return Err(classify_status(IndexError::Response(
            "errors flag set but no item reported an error".to_string(),
        )));
    }
    Ok(summary)
}

fn reason(error: &Value) -> String {
    match (error.get("type"), error.get("reason")) {
        (Some(Value::String(kind)), Some(Value::String(reason))) => format!("{kind}: {reason}"),
        (Some(Value::String(kind)), _) => kind.clone(),
        _ => error.to_string(),
    }
}
