//! Classification of PostgreSQL client errors.

use sync_core::{ErrorKind, Origin, SyncError};

/// Map a `tokio_postgres` error onto the sync error taxonomy.
///
/// Server errors are classified by SQLSTATE class. Client-side errors count
/// as transient when the connection is gone or the underlying cause is I/O.
pub fn classify(e: tokio_postgres::Error) -> SyncError {
    if e.is_closed() {
        return SyncError::transient(Origin::Source, e);
    }

    if let Some(state) = e.code() {
        let kind = classify_sqlstate(state.code());
        return SyncError::new(kind, Origin::Source, e);
    }

    let io_cause = std::error::Error::source(&e)
        .map(|cause| cause.downcast_ref::<std::io::Error>().is_some())
        .unwrap_or(false);
    if io_cause {
        return SyncError::transient(Origin::Source, e);
    }

    SyncError::unclassified(Origin::Source, e)
}

/// Classify a five-character SQLSTATE code by its class.
pub fn classify_sqlstate(code: &str) -> ErrorKind {
    match code.get(..2).unwrap_or_default() {
        // connection exception, transaction rollback, insufficient
        // resources, operator intervention, system error
        "08" | "40" | "53" | "57" | "58" => ErrorKind::Transient,
        // data exception, integrity constraint violation, syntax error or
        // access rule violation, feature not supported, invalid catalog or
        // schema name
        "22" | "23" | "42" | "0A" | "3D" | "3F" => ErrorKind::DataIntegrity,
        _ => ErrorKind::Unclassified,
    }
}
