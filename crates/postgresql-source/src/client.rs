//! PostgreSQL client utilities
//!
//! This module provides utilities for creating PostgreSQL client connections.

use std::time::Duration;
use sync_core::{Origin, SyncError};
use tokio_postgres::{Client, NoTls};
use tracing::{error, info};

use crate::error::classify;
use crate::SourceOpts;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Create a new PostgreSQL client with connection handling
pub async fn new_postgresql_client(opts: &SourceOpts) -> Result<Client, SyncError> {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&opts.host)
        .port(opts.port)
        .user(&opts.user)
        .password(opts.password.as_str())
        .dbname(&opts.dbname)
        .application_name("pg-es-sync");

    let client = connect(&config, CONNECT_TIMEOUT).await?;
    info!(
        "Connected to PostgreSQL at {}:{}/{}",
        opts.host, opts.port, opts.dbname
    );
    Ok(client)
}

/// Connect and spawn the connection task. Hitting `timeout` is transient.
async fn connect(config: &tokio_postgres::Config, timeout: Duration) -> Result<Client, SyncError> {
    let (client, connection) = tokio::time::timeout(timeout, config.connect(NoTls))
        .await
        .map_err(|elapsed| SyncError::transient(Origin::Source, elapsed))?
        .map_err(classify)?;

    // Spawn connection handler
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("PostgreSQL connection error: {e}");
        }
    });

    Ok(client)
}
