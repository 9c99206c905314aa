//! Knowledge base: lazily loaded Wikidata/Wikipedia lookup tables.
//!
//! The knowledge base is split into independently loadable mappings, each
//! named by a [`MappingName`]. Linker stages declare the mappings they need;
//! the [`EntityDatabase`] materializes each one at most once per run from a
//! [`KnowledgeSource`].
//!
//! ```text
//! KnowledgeSource ──rows──▶ EntityDatabase ──lookups──▶ linkers
//!  (TSV dir / memory)        (OnceCell per mapping)
//! ```

mod database;
mod source;

pub use database::EntityDatabase;
pub use source::{InMemorySource, KnowledgeSource, Record, TsvSource};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability tag for one knowledge-base mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingName {
    /// entity id → canonical name, popularity.
    Entities,
    /// alias → candidate entity ids (and the inverse).
    Aliases,
    /// Wikipedia title → entity id.
    WikipediaWikidata,
    /// Redirect title → target title.
    Redirects,
    /// anchor text → {entity id → frequency} (and per-entity totals).
    LinkFrequencies,
    /// entity id → gender.
    Gender,
    /// entity id → full name (and derived given/family names).
    Names,
    /// entity id → type ids.
    Types,
    /// token → corpus unigram count.
    UnigramCounts,
}

impl MappingName {
    /// Every mapping, in load order.
    pub const ALL: [MappingName; 9] = [
        MappingName::Entities,
        MappingName::Aliases,
        MappingName::WikipediaWikidata,
        MappingName::Redirects,
        MappingName::LinkFrequencies,
        MappingName::Gender,
        MappingName::Names,
        MappingName::Types,
        MappingName::UnigramCounts,
    ];

    /// Mappings that must be loaded before this one.
    ///
    /// Link frequency rows name target titles, which are resolved through
    /// [`EntityDatabase::link2id`].
    #[must_use]
    pub fn dependencies(self) -> &'static [MappingName] {
        match self {
            MappingName::LinkFrequencies => {
                &[MappingName::WikipediaWikidata, MappingName::Redirects]
            }
            _ => &[],
        }
    }

    /// File name used by [`TsvSource`].
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            MappingName::Entities => "entities.tsv",
            MappingName::Aliases => "aliases.tsv",
            MappingName::WikipediaWikidata => "wikipedia_wikidata.tsv",
            MappingName::Redirects => "redirects.tsv",
            MappingName::LinkFrequencies => "link_frequencies.tsv",
            MappingName::Gender => "gender.tsv",
            MappingName::Names => "names.tsv",
            MappingName::Types => "types.tsv",
            MappingName::UnigramCounts => "unigrams.tsv",
        }
    }

    /// Number of tab-separated columns per row.
    #[must_use]
    pub fn columns(self) -> usize {
        match self {
            MappingName::Entities | MappingName::LinkFrequencies => 3,
            _ => 2,
        }
    }

    /// Short tag used in logs and errors.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MappingName::Entities => "entities",
            MappingName::Aliases => "aliases",
            MappingName::WikipediaWikidata => "wikipedia_wikidata",
            MappingName::Redirects => "redirects",
            MappingName::LinkFrequencies => "link_frequencies",
            MappingName::Gender => "gender",
            MappingName::Names => "names",
            MappingName::Types => "types",
            MappingName::UnigramCounts => "unigram_counts",
        }
    }
}

impl fmt::Display for MappingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_precede_dependents() {
        for mapping in MappingName::ALL {
            let pos = MappingName::ALL.iter().position(|m| *m == mapping).unwrap();
            for dep in mapping.dependencies() {
                let dep_pos = MappingName::ALL.iter().position(|m| m == dep).unwrap();
                assert!(dep_pos < pos, "{dep} must load before {mapping}");
            }
        }
    }

    #[test]
    fn test_file_names_are_unique() {
        let mut names: Vec<_> = MappingName::ALL.iter().map(|m| m.file_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MappingName::ALL.len());
    }
}
