//! Classification of search index failures.

use sync_core::{ErrorKind, Origin, SyncError};

/// Failures reported by the search index itself.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("bulk upsert of document '{id}' failed with status {status}: {reason}")]
    Item {
        id: String,
        status: u16,
        reason: String,
    },

    #[error("unexpected bulk response: {0}")]
    Response(String),
}

/// Whether an HTTP status is worth retrying: overload, throttling and
/// gateway errors are, everything else is a problem with the request.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub fn classify_status(err: IndexError) -> SyncError {
    let kind = match &err {
        IndexError::Status { status, .. } | IndexError::Item { status, .. }
            if is_retryable_status(*status) =>
        {
            ErrorKind::Transient
        }
        _ => ErrorKind::DataIntegrity,
    };
    SyncError::new(kind, Origin::Index, err)
}

/// Classify a transport-level reqwest failure.
pub fn classify_request(err: reqwest::Error) -> SyncError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        SyncError::transient(Origin::Index, err)
    } else if err.is_decode() || err.is_body() {
        SyncError::integrity(Origin::Index, err)
    } else {
        SyncError::unclassified(Origin::Index, err)
    }
}
