//! Film documents for the movies search index.
//!
//! Turns chunks of changed source rows into partial film documents. All
//! three entity kinds produce documents keyed by the film id:
//!
//! - `film_work` rows carry the film's own fields
//! - `person` rows carry every person linked to one film, packed as
//!   `role*name*id` strings, and become director/actor/writer lists
//! - `genre` rows carry the genre names linked to one film
//!
//! The resulting documents are upserted with merge semantics, so the three
//! partial shapes combine into one stored film document.
//!
//! Assembly is pure: no I/O, no state.

mod film_work;
mod genre;
mod mapping;
mod person;

pub use film_work::{assemble_film_works, FilmWorkBody};
pub use genre::{assemble_genres, GenresBody};
pub use mapping::{movies_index_mapping, MOVIES_INDEX_MAPPING};
pub use person::{assemble_persons, parse_packed_person, PersonRef, PersonsBody, Role};

use sync_core::{Document, EntityKind, SourceRow, SyncError};

/// Assemble one chunk of rows of `entity` into documents, preserving order.
pub fn assemble(entity: EntityKind, rows: &[SourceRow]) -> Result<Vec<Document>, SyncError> {
    match entity {
        EntityKind::FilmWork => assemble_film_works(rows),
        EntityKind::Person => assemble_persons(rows),
        EntityKind::Genre => assemble_genres(rows),
    }
}
