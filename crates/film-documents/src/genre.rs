use serde::{Deserialize, Serialize};
use serde_json::Value;
use sync_core::{Document, Origin, SourceRow, SyncError};

/// Genre fields of a film document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenresBody {
    pub genres: Vec<String>,
}

/// Map aggregated `genre` rows (`film_id`, `genres`) to film documents.
pub fn assemble_genres(rows: &[SourceRow]) -> Result<Vec<Document>, SyncError> {
    rows.iter()
        .map(|row| {
            let film_id = row.required_str("film_id")?;
            let genres = row
                .array("genres")?
                .iter()
                .map(|item| match item {
                    Value::String(name) => Ok(name.clone()),
                    other => Err(SyncError::integrity(
                        Origin::Assembler,
                        format!("Film '{film_id}': genre entry is not a string: {other}"),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?;

            Document::from_body(film_id, &GenresBody { genres })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use sync_core::ErrorKind;

    #[test]
    fn test_genres_are_listed_on_film_document() {
        let row = SourceRow::new(Utc::now())
            .with("film_id", "f1")
            .with("genres", json!(["Action", "Adventure"]));

        let docs = assemble_genres(&[row]).unwrap();

        assert_eq!(docs[0].id, "f1");
        assert_eq!(
            Value::Object(docs[0].fields.clone()),
            json!({"genres": ["Action", "Adventure"]})
        );
    }

    #[test]
    fn test_null_genre_is_integrity_error() {
        let row = SourceRow::new(Utc::now())
            .with("film_id", "f1")
            .with("genres", json!(["Action", null]));

        let err = assemble_genres(&[row]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(err.to_string().contains("Film 'f1'"));
    }
}
