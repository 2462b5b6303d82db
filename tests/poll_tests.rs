//! Poll loop retry, backoff and abort behavior.
//!
//! Tokio's clock is paused, so sleeps complete instantly and elapsed time
//! tracks the requested delays.

use pg_es_sync::poll;
use pg_es_sync::testing::{test_options, ts, FilmWorkRow, MemoryConnector, MemorySource};
use std::time::Duration;
use sync_core::{EntityKind, ErrorKind};
use tokio::time::Instant;

/// The timer wheel rounds deadlines up to whole milliseconds, so allow a
/// little slack per sleep.
fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed <= expected + Duration::from_millis(10),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

async fn connector_with_one_film() -> MemoryConnector {
    let source = MemorySource::new(10);
    source
        .put_film_work(FilmWorkRow::new("f1", "The Star", ts(0)))
        .await;
    MemoryConnector::new(source)
}

#[tokio::test(start_paused = true)]
async fn test_single_round_syncs_every_entity() {
    let mut connector = connector_with_one_film().await;

    let summary = poll::run(&mut connector, &test_options()).await.unwrap();

    assert_eq!(summary.rounds, 1);
    assert_eq!(summary.retries, 0);
    let round = summary.last_round.unwrap();
    let entities: Vec<_> = round.passes.iter().map(|p| p.entity).collect();
    assert_eq!(entities, EntityKind::ALL.to_vec());
    assert_eq!(round.pass(EntityKind::FilmWork).unwrap().documents, 1);
    assert!(connector.index.index.exists("movies").await);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_back_off_then_succeed() {
    let mut connector = connector_with_one_film().await;
    for _ in 0..3 {
        connector.fail_next_connect(ErrorKind::Transient).await;
    }

    let start = Instant::now();
    let summary = poll::run(&mut connector, &test_options()).await.unwrap();

    assert_elapsed(start, Duration::from_millis(100 + 200 + 400));
    assert_eq!(summary.retries, 3);
    assert_eq!(summary.rounds, 1);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_growth_is_capped_at_ten_seconds() {
    let mut connector = connector_with_one_film().await;
    for _ in 0..9 {
        connector.fail_next_connect(ErrorKind::Transient).await;
    }

    let start = Instant::now();
    poll::run(&mut connector, &test_options()).await.unwrap();

    // 0.1 * 2^n for n = 0..=6, then the 10s cap twice.
    let expected_ms = 100 + 200 + 400 + 800 + 1600 + 3200 + 6400 + 10_000 + 10_000;
    assert_elapsed(start, Duration::from_millis(expected_ms));
}

#[tokio::test(start_paused = true)]
async fn test_successful_round_resets_backoff() {
    let mut connector = connector_with_one_film().await;
    connector.fail_next_connect(ErrorKind::Transient).await;
    connector.fail_next_connect(ErrorKind::Transient).await;
    // Round 1 makes six source calls: film_work seeds, opens and fetches
    // twice, person and genre find empty tables. The seventh call is
    // round 2 opening the film_work pass.
    connector.source.fail_call(7, ErrorKind::Transient).await;

    let mut options = test_options();
    options.max_rounds = Some(2);
    options.poll_interval = Duration::from_secs(1);

    let start = Instant::now();
    let summary = poll::run(&mut connector, &options).await.unwrap();

    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.retries, 3);
    // 100ms + 200ms before round 1, the poll interval, then 100ms again.
    assert_elapsed(start, Duration::from_millis(100 + 200 + 1000 + 100));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_mid_round_reconnects() {
    let mut connector = connector_with_one_film().await;
    connector.index.fail_next_bulk(ErrorKind::Transient).await;

    let summary = poll::run(&mut connector, &test_options()).await.unwrap();

    assert_eq!(summary.retries, 1);
    assert_eq!(connector.connects(), 2);
    assert_eq!(connector.index.ensure_calls(), 2);
    assert!(connector.index.index.document("movies", "f1").await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_data_integrity_error_aborts_without_retry() {
    let mut connector = connector_with_one_film().await;
    connector.source.fail_next(ErrorKind::DataIntegrity).await;

    let start = Instant::now();
    let err = poll::run(&mut connector, &test_options())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DataIntegrity);
    assert_elapsed(start, Duration::ZERO);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unclassified_error_aborts() {
    let mut connector = connector_with_one_film().await;
    connector.index.fail_next_bulk(ErrorKind::Unclassified).await;

    let err = poll::run(&mut connector, &test_options())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unclassified);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_max_retries_gives_up() {
    let mut connector = connector_with_one_film().await;
    for _ in 0..5 {
        connector.fail_next_connect(ErrorKind::Transient).await;
    }
    let mut options = test_options();
    options.max_retries = Some(2);

    let start = Instant::now();
    let err = poll::run(&mut connector, &options).await.unwrap_err();

    assert!(err.is_transient());
    assert_elapsed(start, Duration::from_millis(100 + 200));
    assert_eq!(connector.connects(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rounds_are_separated_by_poll_interval() {
    let mut connector = connector_with_one_film().await;
    let mut options = test_options();
    options.max_rounds = Some(3);
    options.poll_interval = Duration::from_secs(10);

    let start = Instant::now();
    let summary = poll::run(&mut connector, &options).await.unwrap();

    assert_eq!(summary.rounds, 3);
    assert_elapsed(start, Duration::from_secs(20));
    // One session for all rounds.
    assert_eq!(connector.connects(), 1);
    assert_eq!(
        connector.source.fetch_sizes(EntityKind::FilmWork).await,
        vec![1, 0, 0, 0]
    );
}
