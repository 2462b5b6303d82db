//! Redis-based watermark storage implementation.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use sync_core::{Origin, SyncError};

use crate::store::WatermarkBackend;

/// Redis implementation of the WatermarkBackend trait.
///
/// Each watermark is a plain string key. Reads use `GET`, writes use `MSET`
/// so a single call stays a single atomic write.
#[derive(Clone)]
pub struct RedisBackend {
    connection: MultiplexedConnection,
}

impl RedisBackend {
    /// Connect to Redis at `url` (e.g. `redis://redis:6379/`).
    pub async fn connect(url: &str) -> Result<Self, SyncError> {
        let client = redis::Client::open(url).map_err(classify)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(classify)?;
        tracing::info!("Connected to Redis watermark store at {}", url);
        Ok(Self { connection })
    }
}

#[async_trait]
impl WatermarkBackend for RedisBackend {
    async fn read_raw(&self, key: &str) -> Result<Option<String>, SyncError> {
        let mut connection = self.connection.clone();
        let raw: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(classify)?;

        raw.map(|bytes| {
            String::from_utf8(bytes).map_err(|e| {
                SyncError::integrity(
                    Origin::Watermark,
                    format!("Watermark '{key}' is not valid UTF-8: {e}"),
                )
            })
        })
        .transpose()
    }

    async fn write_raw(&self, key: &str, value: String) -> Result<(), SyncError> {
        let mut connection = self.connection.clone();
        let _: () = redis::cmd("MSET")
            .arg(key)
            .arg(value)
            .query_async(&mut connection)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// Map a Redis error onto the sync error taxonomy.
pub(crate) fn classify(e: redis::RedisError) -> SyncError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        return SyncError::transient(Origin::Watermark, e);
    }
    match e.kind() {
        redis::ErrorKind::BusyLoadingError | redis::ErrorKind::TryAgain => {
            SyncError::transient(Origin::Watermark, e)
        }
        redis::ErrorKind::TypeError => SyncError::integrity(Origin::Watermark, e),
        _ => SyncError::unclassified(Origin::Watermark, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::ErrorKind;

    #[test]
    fn test_io_errors_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = classify(redis::RedisError::from(io));
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(err.origin(), Origin::Watermark);
    }

    #[test]
    fn test_type_errors_are_integrity_errors() {
        let e = redis::RedisError::from((redis::ErrorKind::TypeError, "unexpected reply"));
        assert_eq!(classify(e).kind(), ErrorKind::DataIntegrity);
    }

    #[test]
    fn test_loading_is_transient() {
        let e = redis::RedisError::from((redis::ErrorKind::BusyLoadingError, "loading"));
        assert_eq!(classify(e).kind(), ErrorKind::Transient);
    }

    #[test]
    fn test_other_errors_are_unclassified() {
        let e = redis::RedisError::from((redis::ErrorKind::ResponseError, "ERR wrong"));
        assert_eq!(classify(e).kind(), ErrorKind::Unclassified);
    }
}
