use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use sync_core::{Document, Origin, SourceRow, SyncError, PACKED_FIELD_DELIMITER};

/// Role of a person in a film.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Director,
    Actor,
    Writer,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "director" => Ok(Role::Director),
            "actor" => Ok(Role::Actor),
            "writer" => Ok(Role::Writer),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: String,
    pub name: String,
}

/// Person fields of a film document, grouped by role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonsBody {
    pub directors_names: Vec<String>,
    pub actors_names: Vec<String>,
    pub writers_names: Vec<String>,
    pub directors: Vec<PersonRef>,
    pub actors: Vec<PersonRef>,
    pub writers: Vec<PersonRef>,
}

impl PersonsBody {
    pub fn push(&mut self, role: Role, person: PersonRef) {
        let (names, refs) = match role {
            Role::Director => (&mut self.directors_names, &mut self.directors),
            Role::Actor => (&mut self.actors_names, &mut self.actors),
            Role::Writer => (&mut self.writers_names, &mut self.writers),
        };
        names.push(person.name.clone());
        refs.push(person);
    }
}

/// Split one packed `role*name*id` element.
///
/// The role ends at the first delimiter and the id starts after the last
/// one, so a delimiter inside the name is kept as part of the name.
pub fn parse_packed_person(film_id: &str, packed: &str) -> Result<(Role, PersonRef), SyncError> {
    let malformed = || {
        SyncError::integrity(
            Origin::Assembler,
            format!("Film '{film_id}': malformed person entry '{packed}'"),
        )
    };

    let (role, rest) = packed
        .split_once(PACKED_FIELD_DELIMITER)
        .ok_or_else(malformed)?;
    let (name, id) = rest
        .rsplit_once(PACKED_FIELD_DELIMITER)
        .ok_or_else(malformed)?;
    if id.is_empty() {
        return Err(malformed());
    }

    let role = role.parse::<Role>().map_err(|_| {
        SyncError::integrity(
            Origin::Assembler,
            format!("Film '{film_id}': unknown role '{role}' for person '{id}'"),
        )
    })?;

    Ok((
        role,
        PersonRef {
            id: id.to_string(),
            name: name.to_string(),
        },
    ))
}

/// Map aggregated `person` rows (`film_id`, `persons`) to film documents.
pub fn assemble_persons(rows: &[SourceRow]) -> Result<Vec<Document>, SyncError> {
    rows.iter()
        .map(|row| {
            let film_id = row.required_str("film_id")?;
            let mut body = PersonsBody::default();

            for item in row.array("persons")? {
                let packed = match item {
                    Value::String(s) => s,
                    other => {
                        return Err(SyncError::integrity(
                            Origin::Assembler,
                            format!("Film '{film_id}': person entry is not a string: {other}"),
                        ))
                    }
                };
                let (role, person) = parse_packed_person(film_id, packed)?;
                body.push(role, person);
            }

            Document::from_body(film_id, &body)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use sync_core::ErrorKind;

    fn person_row(film_id: &str, persons: Value) -> SourceRow {
        SourceRow::new(Utc::now())
            .with("film_id", film_id)
            .with("persons", persons)
    }

    #[test]
    fn test_parse_packed_person() {
        let (role, person) = parse_packed_person("f1", "actor*Mark Hamill*p1").unwrap();
        assert_eq!(role, Role::Actor);
        assert_eq!(person.name, "Mark Hamill");
        assert_eq!(person.id, "p1");
    }

    #[test]
    fn test_delimiter_inside_name_is_kept() {
        let (_, person) = parse_packed_person("f1", "writer*Tom * Jerry*p2").unwrap();
        assert_eq!(person.name, "Tom * Jerry");
        assert_eq!(person.id, "p2");
    }

    #[test]
    fn test_malformed_entry_is_rejected() {
        for packed in ["actor", "actor*Mark Hamill", "actor*Mark Hamill*"] {
            let err = parse_packed_person("f1", packed).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DataIntegrity, "{packed}");
            assert!(err.to_string().contains("malformed"), "{packed}");
        }
    }

    #[test]
    fn test_unknown_role_is_integrity_error() {
        let err = assemble_persons(&[person_row("f1", json!(["producer*Gary Kurtz*p9"]))])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(err.to_string().contains("unknown role 'producer'"));
        assert!(err.to_string().contains("Film 'f1'"));
    }

    #[test]
    fn test_persons_are_grouped_by_role() {
        let docs = assemble_persons(&[person_row(
            "f1",
            json!([
                "director*George Lucas*p0",
                "actor*Mark Hamill*p1",
                "actor*Carrie Fisher*p2",
                "writer*George Lucas*p0",
            ]),
        )])
        .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "f1");
        assert_eq!(
            Value::Object(docs[0].fields.clone()),
            json!({
                "directors_names": ["George Lucas"],
                "actors_names": ["Mark Hamill", "Carrie Fisher"],
                "writers_names": ["George Lucas"],
                "directors": [{"id": "p0", "name": "George Lucas"}],
                "actors": [
                    {"id": "p1", "name": "Mark Hamill"},
                    {"id": "p2", "name": "Carrie Fisher"}
                ],
                "writers": [{"id": "p0", "name": "George Lucas"}],
            })
        );
    }

    #[test]
    fn test_document_id_is_film_not_person() {
        let docs = assemble_persons(&[person_row("film-42", json!(["actor*A*person-7"]))]).unwrap();
        assert_eq!(docs[0].id, "film-42");
        assert!(!docs[0].fields.contains_key("id"));
    }

    #[test]
    fn test_missing_persons_defaults_to_empty_lists() {
        let docs = assemble_persons(&[person_row("f1", Value::Null)]).unwrap();
        assert_eq!(docs[0].fields["actors"], json!([]));
        assert_eq!(docs[0].fields["writers_names"], json!([]));
    }

    #[test]
    fn test_null_entry_is_integrity_error() {
        let err = assemble_persons(&[person_row("f1", json!([null]))]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
    }
}
