use serde::{Deserialize, Serialize};
use sync_core::{Document, SourceRow, SyncError};

/// Fields owned by the `film_work` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmWorkBody {
    pub id: String,
    pub imdb_rating: Option<f64>,
    pub title: String,
    pub description: Option<String>,
}

/// Map `film_work` rows (`id`, `rating`, `title`, `description`) to documents.
pub fn assemble_film_works(rows: &[SourceRow]) -> Result<Vec<Document>, SyncError> {
    rows.iter()
        .map(|row| {
            let body = FilmWorkBody {
                id: row.required_str("id")?.to_string(),
                imdb_rating: row.optional_f64("rating")?,
                title: row.required_str("title")?.to_string(),
                description: row.optional_str("description")?.map(str::to_string),
            };
            Document::from_body(body.id.clone(), &body)
        })
        .collect()
}
