//! Unit tests for the watermark crate.

use chrono::{Duration, TimeZone, Utc};
use sync_core::{EntityKind, ErrorKind};
use tempfile::TempDir;

use crate::{FilesystemBackend, MemoryBackend, WatermarkBackend, WatermarkManager};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 6, 16, 20, 14, 9).unwrap()
}

// ============================================================================
// WatermarkManager Tests
// ============================================================================

#[tokio::test]
async fn test_get_absent_watermark_is_none() {
    let manager = WatermarkManager::new(MemoryBackend::new());
    assert_eq!(manager.get(EntityKind::FilmWork).await.unwrap(), None);
}

#[tokio::test]
async fn test_set_then_get_roundtrip() {
    let manager = WatermarkManager::new(MemoryBackend::new());
    let at = t0() + Duration::microseconds(42);

    manager.set(EntityKind::Person, at).await.unwrap();

    assert_eq!(manager.get(EntityKind::Person).await.unwrap(), Some(at));
    assert_eq!(manager.get(EntityKind::Genre).await.unwrap(), None);
}

#[tokio::test]
async fn test_watermark_is_stored_under_entity_name_as_iso_string() {
    let backend = MemoryBackend::new();
    let manager = WatermarkManager::new(backend.clone());

    manager.set(EntityKind::FilmWork, t0()).await.unwrap();

    let snapshot = backend.snapshot().await;
    assert_eq!(
        snapshot.get("film_work").map(String::as_str),
        Some("2021-06-16T20:14:09.000000+00:00")
    );
}

#[tokio::test]
async fn test_advance_moves_forward() {
    let manager = WatermarkManager::new(MemoryBackend::new());
    let next = t0() + Duration::seconds(5);

    let effective = manager.advance(EntityKind::Genre, t0(), next).await.unwrap();

    assert_eq!(effective, next);
    assert_eq!(manager.get(EntityKind::Genre).await.unwrap(), Some(next));
}

#[tokio::test]
async fn test_advance_never_moves_backwards() {
    let backend = MemoryBackend::new();
    let manager = WatermarkManager::new(backend.clone());
    manager.set(EntityKind::FilmWork, t0()).await.unwrap();

    let effective = manager
        .advance(EntityKind::FilmWork, t0(), t0() - Duration::seconds(1))
        .await
        .unwrap();

    assert_eq!(effective, t0());
    assert_eq!(manager.get(EntityKind::FilmWork).await.unwrap(), Some(t0()));
    assert_eq!(backend.history().await.len(), 1);
}

#[tokio::test]
async fn test_advance_to_same_value_skips_write() {
    let backend = MemoryBackend::new();
    let manager = WatermarkManager::new(backend.clone());

    manager
        .advance(EntityKind::FilmWork, t0(), t0())
        .await
        .unwrap();

    assert!(backend.history().await.is_empty());
}

#[tokio::test]
async fn test_corrupt_value_is_integrity_error() {
    let backend = MemoryBackend::new();
    backend
        .write_raw("person", "not a time".to_string())
        .await
        .unwrap();
    let manager = WatermarkManager::new(backend);

    let err = manager.get(EntityKind::Person).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataIntegrity);
}

#[tokio::test]
async fn test_resume_without_watermark_is_none() {
    let manager = WatermarkManager::new(MemoryBackend::new());
    assert_eq!(manager.resume(EntityKind::FilmWork).await.unwrap(), None);
}

#[tokio::test]
async fn test_resume_starts_at_watermark_when_writes_caught_up() {
    let manager = WatermarkManager::new(MemoryBackend::new());
    manager.set(EntityKind::Person, t0()).await.unwrap();
    manager.set_written(EntityKind::Person, t0()).await.unwrap();

    let resume = manager.resume(EntityKind::Person).await.unwrap().unwrap();

    assert_eq!(resume.committed, t0());
    assert_eq!(resume.from, t0());
}

#[tokio::test]
async fn test_resume_replays_unwritten_chunk() {
    let manager = WatermarkManager::new(MemoryBackend::new());
    let fetched = t0() + Duration::seconds(30);
    manager.set(EntityKind::Genre, fetched).await.unwrap();
    manager.set_written(EntityKind::Genre, t0()).await.unwrap();

    let resume = manager.resume(EntityKind::Genre).await.unwrap().unwrap();

    assert_eq!(resume.committed, fetched);
    assert_eq!(resume.from, t0());
    // The watermark itself is untouched.
    assert_eq!(manager.get(EntityKind::Genre).await.unwrap(), Some(fetched));
}

#[tokio::test]
async fn test_resume_adopts_watermark_without_written_mark() {
    let backend = MemoryBackend::new();
    backend
        .write_raw("film_work", "2021-06-16 20:14:09.221000+00:00".to_string())
        .await
        .unwrap();
    let manager = WatermarkManager::new(backend.clone());

    let resume = manager.resume(EntityKind::FilmWork).await.unwrap().unwrap();

    assert_eq!(resume.from, resume.committed);
    assert!(backend.snapshot().await.contains_key("film_work_written"));
}

// ============================================================================
// FilesystemBackend Tests
// ============================================================================

#[tokio::test]
async fn test_filesystem_missing_key_is_none() {
    let tmp = TempDir::new().unwrap();
    let backend = FilesystemBackend::new(tmp.path().join("does-not-exist-yet"));
    assert_eq!(backend.read_raw("film_work").await.unwrap(), None);
}

#[tokio::test]
async fn test_filesystem_roundtrip_and_overwrite() {
    let tmp = TempDir::new().unwrap();
    let backend = FilesystemBackend::new(tmp.path().join("watermarks"));

    backend
        .write_raw("film_work", "2021-01-01T00:00:00.000000+00:00".to_string())
        .await
        .unwrap();
    backend
        .write_raw("film_work", "2021-01-02T00:00:00.000000+00:00".to_string())
        .await
        .unwrap();

    assert_eq!(
        backend.read_raw("film_work").await.unwrap().as_deref(),
        Some("2021-01-02T00:00:00.000000+00:00")
    );
    assert!(tmp.path().join("watermarks/film_work.watermark").exists());
    assert!(!tmp.path().join("watermarks/.film_work.watermark.tmp").exists());
}

#[tokio::test]
async fn test_filesystem_backed_manager_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let at = t0() + Duration::microseconds(7);

    {
        let manager = WatermarkManager::new(FilesystemBackend::new(tmp.path()));
        manager.set(EntityKind::Genre, at).await.unwrap();
    }

    let manager = WatermarkManager::new(FilesystemBackend::new(tmp.path()));
    assert_eq!(manager.get(EntityKind::Genre).await.unwrap(), Some(at));
}
