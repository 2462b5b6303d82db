//! SQL templates for change extraction.
//!
//! Every change query takes the watermark as its only parameter (`$1`),
//! returns a `modified` column, and is ordered by it ascending. The
//! many-to-many entities aggregate their children per film and filter on
//! the aggregate, so a film is surfaced when any linked person or genre
//! changed after the watermark.

use sync_core::{EntityKind, PACKED_FIELD_DELIMITER};

/// Query returning the earliest `modified` value of the entity's own table.
pub fn first_modified(schema: &str, entity: EntityKind) -> String {
    format!(
        "SELECT MIN(modified) AS modified FROM {schema}.{table}",
        table = entity.table()
    )
}

/// Query returning every change of `entity` newer than `$1`.
pub fn select_changes(schema: &str, entity: EntityKind) -> String {
    match entity {
        EntityKind::FilmWork => format!(
            "SELECT id, rating, title, description, modified \
             FROM {schema}.film_work \
             WHERE modified > $1 \
             ORDER BY modified, id"
        ),
        EntityKind::Person => format!(
            "SELECT pfw.film_work_id AS film_id, \
             ARRAY_AGG(pfw.role || '{d}' || p.full_name || '{d}' || p.id ORDER BY p.full_name) AS persons, \
             MAX(p.modified) AS modified \
             FROM {schema}.person_film_work pfw \
             JOIN {schema}.person p ON p.id = pfw.person_id \
             GROUP BY pfw.film_work_id \
             HAVING MAX(p.modified) > $1 \
             ORDER BY modified, film_id",
            d = PACKED_FIELD_DELIMITER
        ),
        EntityKind::Genre => format!(
            "SELECT gfw.film_work_id AS film_id, \
             ARRAY_AGG(g.name ORDER BY g.name) AS genres, \
             MAX(g.modified) AS modified \
             FROM {schema}.genre_film_work gfw \
             JOIN {schema}.genre g ON g.id = gfw.genre_id \
             GROUP BY gfw.film_work_id \
             HAVING MAX(g.modified) > $1 \
             ORDER BY modified, film_id"
        ),
    }
}

/// Whether `name` can be spliced into SQL as an unquoted identifier.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_modified_targets_entity_table() {
        assert_eq!(
            first_modified("content", EntityKind::Person),
            "SELECT MIN(modified) AS modified FROM content.person"
        );
    }

    #[test]
    fn test_every_change_query_is_watermarked_and_ordered() {
        for entity in EntityKind::ALL {
            let sql = select_changes("content", entity);
            assert!(sql.contains("> $1"), "{entity}: {sql}");
            assert!(sql.contains("ORDER BY modified"), "{entity}: {sql}");
            assert!(!sql.contains("$2"), "{entity}: {sql}");
        }
    }

    #[test]
    fn test_aggregates_filter_after_grouping() {
        let person = select_changes("content", EntityKind::Person);
        assert!(person.contains("GROUP BY pfw.film_work_id"));
        assert!(person.contains("HAVING MAX(p.modified) > $1"));
        assert!(!person.contains("WHERE"));
        assert!(person.contains("pfw.role || '*' || p.full_name || '*' || p.id"));

        let genre = select_changes("content", EntityKind::Genre);
        assert!(genre.contains("HAVING MAX(g.modified) > $1"));
        assert!(!genre.contains("WHERE"));
    }

    #[test]
    fn test_schema_is_applied_to_every_table() {
        let sql = select_changes("movies_v2", EntityKind::Person);
        assert!(sql.contains("movies_v2.person_film_work"));
        assert!(sql.contains("movies_v2.person p"));
    }

    #[test]
    fn test_plain_identifier() {
        assert!(is_plain_identifier("content"));
        assert!(is_plain_identifier("_private2"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("2content"));
        assert!(!is_plain_identifier("content; DROP TABLE film_work"));
        assert!(!is_plain_identifier("public.content"));
    }
}
