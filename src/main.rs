//! Command-line interface for pg-es-sync
//!
//! Every option can also be set through the environment variable shown in
//! `--help`.
//!
//! ```bash
//! DB_HOST=localhost ELC_HOST=http://localhost REDIS_HOST=localhost pg-es-sync
//! ```

use anyhow::Context;
use clap::Parser;
use pg_es_sync::{poll, Config, ServiceConnector};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_file.as_deref())?;
    config.validate()?;

    let mapping =
        film_documents::movies_index_mapping().context("Failed to load the movies index mapping")?;
    let options = config.poll_options(mapping);
    let mut connector = ServiceConnector::from_config(&config);

    if config.dry_run {
        info!("Dry run: watermarks and documents are kept in memory");
    }
    info!(
        "Syncing {}:{}/{} into {} index '{}' every {:?}",
        config.postgres.db_host,
        config.postgres.db_port,
        config.postgres.db_name,
        config.elastic_url(),
        options.index,
        options.poll_interval
    );

    let summary = poll::run(&mut connector, &options)
        .await
        .context("Sync loop stopped")?;

    info!(
        "Finished after {} rounds ({} retries)",
        summary.rounds, summary.retries
    );
    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}
