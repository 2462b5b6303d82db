//! Error taxonomy shared by every collaborator of the sync engine.
//!
//! Each adapter (PostgreSQL, Redis, Elasticsearch, the assemblers) maps its
//! library errors onto an [`ErrorKind`] exactly once, at the boundary. The
//! poll loop is the only place that looks at the kind to decide between
//! retrying and aborting.

use std::fmt;

/// Boxed error used as the source of a [`SyncError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of a failure, deciding retry vs abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connectivity or availability problem expected to resolve after a delay.
    Transient,
    /// Malformed data, constraint violation, unsupported operation or an
    /// unrecoverable API error. Retrying cannot fix it.
    DataIntegrity,
    /// Anything the adapter could not place. Treated as fatal.
    Unclassified,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::DataIntegrity => "data integrity",
            ErrorKind::Unclassified => "unclassified",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Source,
    Watermark,
    Index,
    Assembler,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Source => "source",
            Origin::Watermark => "watermark store",
            Origin::Index => "search index",
            Origin::Assembler => "document assembler",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure raised by one of the sync collaborators.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error in {origin}: {source}")]
pub struct SyncError {
    kind: ErrorKind,
    origin: Origin,
    #[source]
    source: BoxError,
}

impl SyncError {
    pub fn new(kind: ErrorKind, origin: Origin, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            origin,
            source: source.into(),
        }
    }

    pub fn transient(origin: Origin, source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Transient, origin, source)
    }

    pub fn integrity(origin: Origin, source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::DataIntegrity, origin, source)
    }

    pub fn unclassified(origin: Origin, source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Unclassified, origin, source)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(!ErrorKind::DataIntegrity.is_retryable());
        assert!(!ErrorKind::Unclassified.is_retryable());
    }

    #[test]
    fn test_display_includes_kind_and_origin() {
        let err = SyncError::integrity(Origin::Assembler, "unknown role 'producer'");
        assert_eq!(
            err.to_string(),
            "data integrity error in document assembler: unknown role 'producer'"
        );
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert_eq!(err.origin(), Origin::Assembler);
    }

    #[test]
    fn test_source_chain_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = SyncError::transient(Origin::Watermark, io);
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "refused");
        assert!(err.is_transient());
    }
}
