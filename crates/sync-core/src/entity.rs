//! Entity kinds tracked by the sync engine.

use std::fmt;

/// One independently tracked entity kind.
///
/// Every kind has its own change query, watermark and document shape.
/// `person` and `genre` changes are projected onto film documents, so all
/// three kinds produce documents keyed by the film id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    FilmWork,
    Person,
    Genre,
}

impl EntityKind {
    /// All kinds, in the order a sync round processes them.
    pub const ALL: [EntityKind; 3] = [EntityKind::FilmWork, EntityKind::Person, EntityKind::Genre];

    /// Entity name, also the source table name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::FilmWork => "film_work",
            EntityKind::Person => "person",
            EntityKind::Genre => "genre",
        }
    }

    /// Key the watermark for this kind is persisted under.
    pub fn watermark_key(&self) -> &'static str {
        self.as_str()
    }

    /// Table whose `modified` column seeds the first watermark.
    pub fn table(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_key_is_entity_name() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.watermark_key(), kind.to_string());
        }
    }

    #[test]
    fn test_round_order_starts_with_film_work() {
        assert_eq!(EntityKind::ALL[0], EntityKind::FilmWork);
        assert_eq!(EntityKind::ALL[2].table(), "genre");
    }
}
