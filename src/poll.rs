//! The resilient poll loop.
//!
//! Every round syncs each entity once, in table order, over one session.
//! Transient failures drop the session and retry the whole round after an
//! exponential backoff; any other failure stops the loop.

use elasticsearch_sink::IndexSink;
use serde_json::Value;
use std::time::Duration;
use sync_core::{EntityKind, SyncError};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::connect::{Connector, Session};
use crate::loader::{run_pass, PassStats};

/// Retry delay schedule: `min(base * factor^n, cap)` for the n-th
/// consecutive failure, counting from zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub factor: f64,
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            factor: 2.0,
            cap: Duration::from_secs(10),
        }
    }
}

impl Backoff {
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
        let nanos = self.base.as_nanos() as f64 * self.factor.powi(exponent);
        if nanos.is_finite() && nanos < self.cap.as_nanos() as f64 {
            Duration::from_nanos(nanos.round() as u64)
        } else {
            self.cap
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub index: String,
    /// Index settings and mappings used when the index has to be created.
    pub mapping: Value,
    pub poll_interval: Duration,
    pub backoff: Backoff,
    /// Stop after this many successful rounds (default: never).
    pub max_rounds: Option<u64>,
    /// Give up after this many consecutive transient failures
    /// (default: retry forever).
    pub max_retries: Option<u32>,
}

/// Per-entity results of one successful round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundStats {
    pub passes: Vec<PassStats>,
}

impl RoundStats {
    pub fn rows(&self) -> usize {
        self.passes.iter().map(|p| p.rows).sum()
    }

    pub fn documents(&self) -> usize {
        self.passes.iter().map(|p| p.documents).sum()
    }

    pub fn pass(&self, entity: EntityKind) -> Option<&PassStats> {
        self.passes.iter().find(|p| p.entity == entity)
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub rounds: u64,
    /// Transient failures that were retried.
    pub retries: u64,
    pub last_round: Option<RoundStats>,
}

type SessionOf<C> = Session<
    <C as Connector>::Source,
    <C as Connector>::Backend,
    <C as Connector>::Sink,
>;

/// Run rounds until `max_rounds` is reached or a non-transient error occurs.
pub async fn run<C: Connector>(
    connector: &mut C,
    options: &PollOptions,
) -> Result<RunSummary, SyncError> {
    let mut session: Option<SessionOf<C>> = None;
    let mut summary = RunSummary::default();
    let mut failures: u32 = 0;

    loop {
        match run_round(connector, &mut session, options).await {
            Ok(round) => {
                failures = 0;
                summary.rounds += 1;
                info!(
                    "Round {} complete: {} rows, {} documents",
                    summary.rounds,
                    round.rows(),
                    round.documents()
                );
                summary.last_round = Some(round);

                if options
                    .max_rounds
                    .is_some_and(|max| summary.rounds >= max)
                {
                    return Ok(summary);
                }
                sleep(options.poll_interval).await;
            }
            Err(err) if err.is_transient() => {
                if options.max_retries.is_some_and(|max| failures >= max) {
                    error!("Giving up after {failures} consecutive retries: {err}");
                    return Err(err);
                }
                let delay = options.backoff.delay(failures);
                failures += 1;
                summary.retries += 1;
                warn!("{err}; reconnecting in {delay:?} (retry {failures})");
                sleep(delay).await;
            }
            Err(err) => {
                error!("Critical error, stopping: {err}");
                return Err(err);
            }
        }
    }
}

/// One round over every entity. The session is taken out of `slot` and
/// only put back on success, so any failure forces a reconnect.
async fn run_round<C: Connector>(
    connector: &mut C,
    slot: &mut Option<SessionOf<C>>,
    options: &PollOptions,
) -> Result<RoundStats, SyncError> {
    let mut session = match slot.take() {
        Some(session) => session,
        None => {
            let session = connector.connect().await?;
            let status = session
                .sink
                .ensure_index(&options.index, &options.mapping)
                .await?;
            info!("Connected; index '{}' {:?}", options.index, status);
            session
        }
    };

    let mut round = RoundStats::default();
    for entity in EntityKind::ALL {
        round
            .passes
            .push(run_pass(&mut session, &options.index, entity).await?);
    }

    *slot = Some(session);
    Ok(round)
}
