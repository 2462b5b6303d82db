//! In-memory fakes for driving the loader and the poll loop in tests.
//!
//! [`MemorySource`] holds the movies tables and answers change queries the
//! same way the SQL templates do: `film_work` rows directly, `person` and
//! `genre` changes aggregated per film with the maximum child `modified`.
//! Failures can be injected into the source, the index and the connector.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use elasticsearch_sink::{BulkSummary, IndexSink, IndexStatus, MemoryIndex};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use sync_core::{
    ChangeCursor, ChangeSource, Document, EntityKind, ErrorKind, Origin, SourceRow, SyncError,
    PACKED_FIELD_DELIMITER,
};
use tokio::sync::Mutex;
use watermark::{MemoryBackend, WatermarkManager};

use crate::connect::{Connector, Session};
use crate::poll::{Backoff, PollOptions};

/// Fixed base instant for test data.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 6, 16, 20, 14, 9)
        .single()
        .unwrap_or_default()
}

/// `t0()` plus `secs` seconds.
pub fn ts(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

/// Poll options for tests: one round, no pause, default backoff.
pub fn test_options() -> PollOptions {
    PollOptions {
        index: "movies".to_string(),
        mapping: film_documents::movies_index_mapping().unwrap_or(Value::Null),
        poll_interval: std::time::Duration::ZERO,
        backoff: Backoff::default(),
        max_rounds: Some(1),
        max_retries: None,
    }
}

fn injected(kind: ErrorKind, origin: Origin, what: &str) -> SyncError {
    SyncError::new(kind, origin, format!("injected {what} failure"))
}

#[derive(Debug, Clone)]
pub struct FilmWorkRow {
    pub id: String,
    pub title: String,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub modified: DateTime<Utc>,
}

impl FilmWorkRow {
    pub fn new(id: &str, title: &str, modified: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            rating: None,
            description: None,
            modified,
        }
    }

    pub fn rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

#[derive(Debug, Clone)]
struct NamedRow {
    name: String,
    modified: DateTime<Utc>,
}

#[derive(Default)]
struct SourceState {
    film_works: BTreeMap<String, FilmWorkRow>,
    persons: BTreeMap<String, NamedRow>,
    /// (film id, person id, role)
    person_links: Vec<(String, String, String)>,
    genres: BTreeMap<String, NamedRow>,
    /// (film id, genre id)
    genre_links: Vec<(String, String)>,
    fetches: Vec<(EntityKind, usize)>,
    /// Source calls made so far.
    calls: usize,
    /// Call number (1-based) -> failure to inject.
    faults: BTreeMap<usize, ErrorKind>,
}

impl SourceState {
    fn take_fault(&mut self, what: &str) -> Result<(), SyncError> {
        self.calls += 1;
        match self.faults.remove(&self.calls) {
            Some(kind) => Err(injected(kind, Origin::Source, what)),
            None => Ok(()),
        }
    }

    fn first_modified(&self, entity: EntityKind) -> Option<DateTime<Utc>> {
        match entity {
            EntityKind::FilmWork => self.film_works.values().map(|f| f.modified).min(),
            EntityKind::Person => self.persons.values().map(|p| p.modified).min(),
            EntityKind::Genre => self.genres.values().map(|g| g.modified).min(),
        }
    }

    fn changes(&self, entity: EntityKind, watermark: DateTime<Utc>) -> Vec<SourceRow> {
        let mut rows: Vec<(DateTime<Utc>, String, SourceRow)> = match entity {
            EntityKind::FilmWork => self
                .film_works
                .values()
                .filter(|f| f.modified > watermark)
                .map(|f| {
                    let row = SourceRow::new(f.modified)
                        .with("id", f.id.as_str())
                        .with("rating", f.rating.map_or(Value::Null, |r| json!(r)))
                        .with("title", f.title.as_str())
                        .with("description", f.description.clone());
                    (f.modified, f.id.clone(), row)
                })
                .collect(),
            EntityKind::Person => {
                let links = self.person_links.iter().map(|(film, person, role)| {
                    (film, person, Some(role.as_str()))
                });
                aggregate(links, &self.persons, "persons", watermark)
            }
            EntityKind::Genre => {
                let links = self
                    .genre_links
                    .iter()
                    .map(|(film, genre)| (film, genre, None));
                aggregate(links, &self.genres, "genres", watermark)
            }
        };
        rows.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        rows.into_iter().map(|(_, _, row)| row).collect()
    }
}

/// Group child rows per film like the `ARRAY_AGG ... HAVING MAX(modified)`
/// queries do. With a role the element is packed as `role*name*id`,
/// otherwise it is the plain name.
fn aggregate<'a>(
    links: impl Iterator<Item = (&'a String, &'a String, Option<&'a str>)>,
    children: &BTreeMap<String, NamedRow>,
    column: &str,
    watermark: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, String, SourceRow)> {
    let mut per_film: BTreeMap<&String, Vec<(String, String, DateTime<Utc>)>> = BTreeMap::new();
    for (film, child_id, role) in links {
        // Inner join: links to missing children are dropped.
        let Some(child) = children.get(child_id) else {
            continue;
        };
        let element = match role {
            Some(role) => format!(
                "{role}{d}{name}{d}{child_id}",
                d = PACKED_FIELD_DELIMITER,
                name = child.name
            ),
            None => child.name.clone(),
        };
        per_film
            .entry(film)
            .or_default()
            .push((child.name.clone(), element, child.modified));
    }

    per_film
        .into_iter()
        .filter_map(|(film, mut elements)| {
            let modified = elements.iter().map(|e| e.2).max()?;
            if modified <= watermark {
                return None;
            }
            elements.sort_by(|a, b| a.0.cmp(&b.0));
            let values: Vec<Value> = elements.into_iter().map(|e| json!(e.1)).collect();
            let row = SourceRow::new(modified)
                .with("film_id", film.as_str())
                .with(column, values);
            Some((modified, film.clone(), row))
        })
        .collect()
}

/// In-memory movies database implementing [`ChangeSource`].
///
/// Clones share the same tables, so a test can change data between rounds
/// while the loop owns another handle.
#[derive(Clone)]
pub struct MemorySource {
    state: Arc<Mutex<SourceState>>,
    chunk_size: usize,
}

impl MemorySource {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SourceState::default())),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Insert or replace a film.
    pub async fn put_film_work(&self, row: FilmWorkRow) {
        self.state
            .lock()
            .await
            .film_works
            .insert(row.id.clone(), row);
    }

    /// Insert or replace a person.
    pub async fn put_person(&self, id: &str, full_name: &str, modified: DateTime<Utc>) {
        self.state.lock().await.persons.insert(
            id.to_string(),
            NamedRow {
                name: full_name.to_string(),
                modified,
            },
        );
    }

    pub async fn link_person(&self, film_id: &str, person_id: &str, role: &str) {
        self.state.lock().await.person_links.push((
            film_id.to_string(),
            person_id.to_string(),
            role.to_string(),
        ));
    }

    /// Insert or replace a genre.
    pub async fn put_genre(&self, id: &str, name: &str, modified: DateTime<Utc>) {
        self.state.lock().await.genres.insert(
            id.to_string(),
            NamedRow {
                name: name.to_string(),
                modified,
            },
        );
    }

    pub async fn link_genre(&self, film_id: &str, genre_id: &str) {
        self.state
            .lock()
            .await
            .genre_links
            .push((film_id.to_string(), genre_id.to_string()));
    }

    /// Make the next source call fail with `kind`. Repeated calls fail
    /// consecutive source calls.
    pub async fn fail_next(&self, kind: ErrorKind) {
        let mut state = self.state.lock().await;
        let last = state.faults.keys().next_back().copied().unwrap_or(0);
        let at = last.max(state.calls) + 1;
        state.faults.insert(at, kind);
    }

    /// Make the `n`-th source call from now fail with `kind` (1 = next).
    ///
    /// Source calls are `first_modified`, `open_pass` and every
    /// `next_chunk`.
    pub async fn fail_call(&self, n: usize, kind: ErrorKind) {
        let mut state = self.state.lock().await;
        let at = state.calls + n;
        state.faults.insert(at, kind);
    }

    /// Row counts of every fetch made for `entity`, including the final
    /// empty one of each pass.
    pub async fn fetch_sizes(&self, entity: EntityKind) -> Vec<usize> {
        self.state
            .lock()
            .await
            .fetches
            .iter()
            .filter(|(e, _)| *e == entity)
            .map(|(_, n)| *n)
            .collect()
    }
}

#[async_trait]
impl ChangeSource for MemorySource {
    async fn first_modified(
        &mut self,
        entity: EntityKind,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        let mut state = self.state.lock().await;
        state.take_fault("first_modified")?;
        Ok(state.first_modified(entity))
    }

    async fn open_pass<'a>(
        &'a mut self,
        entity: EntityKind,
        watermark: DateTime<Utc>,
    ) -> Result<Box<dyn ChangeCursor + 'a>, SyncError> {
        let mut state = self.state.lock().await;
        state.take_fault("open_pass")?;
        let rows = state.changes(entity, watermark).into();
        Ok(Box::new(MemoryCursor {
            state: Arc::clone(&self.state),
            entity,
            rows,
            chunk_size: self.chunk_size,
        }))
    }
}

/// Cursor over a snapshot taken when the pass was opened.
struct MemoryCursor {
    state: Arc<Mutex<SourceState>>,
    entity: EntityKind,
    rows: VecDeque<SourceRow>,
    chunk_size: usize,
}

#[async_trait]
impl ChangeCursor for MemoryCursor {
    async fn next_chunk(&mut self) -> Result<Vec<SourceRow>, SyncError> {
        let mut state = self.state.lock().await;
        state.take_fault("fetch")?;
        let take = self.chunk_size.min(self.rows.len());
        let chunk: Vec<SourceRow> = self.rows.drain(..take).collect();
        state.fetches.push((self.entity, chunk.len()));
        Ok(chunk)
    }

    async fn close(self: Box<Self>) -> Result<(), SyncError> {
        Ok(())
    }
}

/// [`MemoryIndex`] that can be told to fail upcoming calls.
#[derive(Clone, Default)]
pub struct FlakyIndex {
    pub index: MemoryIndex,
    faults: Arc<Mutex<VecDeque<ErrorKind>>>,
    ensure_calls: Arc<AtomicUsize>,
}

impl FlakyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next bulk upsert fail with `kind` without writing anything.
    pub async fn fail_next_bulk(&self, kind: ErrorKind) {
        self.faults.lock().await.push_back(kind);
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexSink for FlakyIndex {
    async fn ensure_index(&self, index: &str, body: &Value) -> Result<IndexStatus, SyncError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.index.ensure_index(index, body).await
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[Document],
    ) -> Result<BulkSummary, SyncError> {
        if let Some(kind) = self.faults.lock().await.pop_front() {
            return Err(injected(kind, Origin::Index, "bulk upsert"));
        }
        self.index.bulk_upsert(index, documents).await
    }
}

/// Connector handing out sessions over shared in-memory stores.
#[derive(Clone)]
pub struct MemoryConnector {
    pub source: MemorySource,
    pub watermarks: MemoryBackend,
    pub index: FlakyIndex,
    connects: Arc<AtomicUsize>,
    faults: Arc<Mutex<VecDeque<ErrorKind>>>,
}

impl MemoryConnector {
    pub fn new(source: MemorySource) -> Self {
        Self {
            source,
            watermarks: MemoryBackend::new(),
            index: FlakyIndex::new(),
            connects: Arc::new(AtomicUsize::new(0)),
            faults: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Make the next connection attempt fail with `kind`.
    pub async fn fail_next_connect(&self, kind: ErrorKind) {
        self.faults.lock().await.push_back(kind);
    }

    /// Successful connections so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// A session outside the poll loop, for driving the loader directly.
    pub fn session(&self) -> Session<MemorySource, MemoryBackend, FlakyIndex> {
        Session::new(
            self.source.clone(),
            WatermarkManager::new(self.watermarks.clone()),
            self.index.clone(),
        )
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Source = MemorySource;
    type Backend = MemoryBackend;
    type Sink = FlakyIndex;

    async fn connect(
        &mut self,
    ) -> Result<Session<Self::Source, Self::Backend, Self::Sink>, SyncError> {
        if let Some(kind) = self.faults.lock().await.pop_front() {
            return Err(injected(kind, Origin::Source, "connect"));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.session())
    }
}
