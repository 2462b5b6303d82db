//! String encoding of watermark instants.
//!
//! Watermarks are stored as ISO-8601 strings with microsecond precision and
//! an explicit offset, e.g. `2021-06-16T20:14:09.221000+00:00`.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use sync_core::{Origin, SyncError};

/// Encode an instant for storage.
pub fn encode(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Decode a stored instant.
///
/// Besides RFC 3339, a space between date and time is accepted, and values
/// without an offset are read as UTC.
pub fn decode(raw: &str) -> Result<DateTime<Utc>, SyncError> {
    let raw = raw.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(SyncError::integrity(
        Origin::Watermark,
        format!("Invalid watermark timestamp: '{raw}'"),
    ))
}
