//! Knowledge-base entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grammatical/KB gender class used for pronoun resolution.
///
/// The set is closed, so per-gender bookkeeping can use a fixed array
/// indexed by [`Gender::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Masculine.
    Male,
    /// Feminine.
    Female,
    /// Non-person or unknown; the default for entities without a gender row.
    #[default]
    Neutral,
    /// Any other gender recorded in the knowledge base.
    Other,
}

impl Gender {
    /// Number of gender classes.
    pub const COUNT: usize = 4;

    /// All classes, in index order.
    pub const ALL: [Gender; Gender::COUNT] =
        [Gender::Male, Gender::Female, Gender::Neutral, Gender::Other];

    /// Dense index in `0..Gender::COUNT`.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
            Gender::Neutral => 2,
            Gender::Other => 3,
        }
    }

    /// Map a free-form gender label from the knowledge base.
    ///
    /// Labels are split on whitespace; a `female` token wins over `male`
    /// ("trans female"), anything unrecognized is [`Gender::Other`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_lowercase();
        let tokens: Vec<&str> = lower.split_whitespace().collect();
        if tokens.contains(&"female") {
            Gender::Female
        } else if tokens.contains(&"male") {
            Gender::Male
        } else {
            Gender::Other
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Neutral => "neutral",
            Gender::Other => "other",
        };
        f.write_str(label)
    }
}

impl FromStr for Gender {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("neutral") {
            return Ok(Gender::Neutral);
        }
        Ok(Gender::from_label(s))
    }
}

/// A Wikidata entity as seen by the linkers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikidataEntity {
    /// Unique entity id, e.g. `Q42`.
    pub entity_id: String,
    /// Canonical (label) name.
    pub name: String,
    /// Popularity score (sitelink count).
    pub popularity: u32,
    /// Known aliases.
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Type ids, e.g. `Q5` for human.
    #[serde(default)]
    pub types: Vec<String>,
    /// Gender class.
    #[serde(default)]
    pub gender: Gender,
}

impl WikidataEntity {
    /// Create an entity with no synonyms, types, or gender.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, name: impl Into<String>, popularity: u32) -> Self {
        Self {
            entity_id: entity_id.into(),
            name: name.into(),
            popularity,
            synonyms: Vec::new(),
            types: Vec::new(),
            gender: Gender::Neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_labels() {
        assert_eq!(Gender::from_label("female"), Gender::Female);
        assert_eq!(Gender::from_label("trans female"), Gender::Female);
        assert_eq!(Gender::from_label("Male"), Gender::Male);
        assert_eq!(Gender::from_label("non-binary"), Gender::Other);
        assert_eq!("neutral".parse::<Gender>().unwrap(), Gender::Neutral);
    }

    #[test]
    fn test_indices_are_dense() {
        for (i, gender) in Gender::ALL.iter().enumerate() {
            assert_eq!(gender.index(), i);
        }
    }
}
