//! The entity database: one lazily loaded table per [`MappingName`].
//!
//! Each table lives in its own `OnceCell`, so a mapping is either absent or
//! completely loaded; readers never observe a half-built table and repeated
//! loads are no-ops. The database is built once per run and shared behind an
//! `Arc` by every stage.

use super::source::{KnowledgeSource, Record};
use super::MappingName;
use crate::error::{Error, Result};
use kblink_core::{Gender, WikidataEntity};
use once_cell::sync::OnceCell;
use std::collections::{BTreeSet, HashMap};
use std::sync::Once;

// =============================================================================
// Tables
// =============================================================================

#[derive(Debug, Default)]
struct EntityRow {
    name: String,
    popularity: u32,
}

#[derive(Debug, Default)]
struct AliasTable {
    candidates: HashMap<String, BTreeSet<String>>,
    /// Inverse map, aliases in source order.
    by_entity: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
struct FrequencyTable {
    by_alias: HashMap<String, HashMap<String, u64>>,
    by_entity: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct NameTable {
    full: HashMap<String, String>,
    given: HashMap<String, String>,
    family: HashMap<String, String>,
}

/// Lazily loaded knowledge base.
pub struct EntityDatabase {
    source: Box<dyn KnowledgeSource>,
    entities: OnceCell<HashMap<String, EntityRow>>,
    aliases: OnceCell<AliasTable>,
    titles: OnceCell<HashMap<String, String>>,
    redirects: OnceCell<HashMap<String, String>>,
    frequencies: OnceCell<FrequencyTable>,
    genders: OnceCell<HashMap<String, Gender>>,
    names: OnceCell<NameTable>,
    types: OnceCell<HashMap<String, Vec<String>>>,
    unigrams: OnceCell<HashMap<String, u64>>,
    gender_warning: Once,
}

impl std::fmt::Debug for EntityDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loaded: Vec<MappingName> = MappingName::ALL
            .into_iter()
            .filter(|m| self.is_loaded(*m))
            .collect();
        f.debug_struct("EntityDatabase")
            .field("source", &self.source.name())
            .field("loaded", &loaded)
            .finish()
    }
}

impl EntityDatabase {
    /// Create an empty database over a row source. Nothing is loaded yet.
    pub fn new(source: impl KnowledgeSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            entities: OnceCell::new(),
            aliases: OnceCell::new(),
            titles: OnceCell::new(),
            redirects: OnceCell::new(),
            frequencies: OnceCell::new(),
            genders: OnceCell::new(),
            names: OnceCell::new(),
            types: OnceCell::new(),
            unigrams: OnceCell::new(),
            gender_warning: Once::new(),
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Whether a mapping has been materialized.
    #[must_use]
    pub fn is_loaded(&self, mapping: MappingName) -> bool {
        match mapping {
            MappingName::Entities => self.entities.get().is_some(),
            MappingName::Aliases => self.aliases.get().is_some(),
            MappingName::WikipediaWikidata => self.titles.get().is_some(),
            MappingName::Redirects => self.redirects.get().is_some(),
            MappingName::LinkFrequencies => self.frequencies.get().is_some(),
            MappingName::Gender => self.genders.get().is_some(),
            MappingName::Names => self.names.get().is_some(),
            MappingName::Types => self.types.get().is_some(),
            MappingName::UnigramCounts => self.unigrams.get().is_some(),
        }
    }

    /// Load a mapping (and its dependencies) unless already loaded.
    ///
    /// A malformed row aborts the load with [`Error::DataLoad`]; the mapping
    /// then stays unloaded.
    pub fn ensure_loaded(&self, mapping: MappingName) -> Result<()> {
        for dep in mapping.dependencies() {
            self.ensure_loaded(*dep)?;
        }
        match mapping {
            MappingName::Entities => self.entities.get_or_try_init(|| self.read_entities()).map(drop),
            MappingName::Aliases => self.aliases.get_or_try_init(|| self.read_aliases()).map(drop),
            MappingName::WikipediaWikidata => self
                .titles
                .get_or_try_init(|| self.read_pairs(MappingName::WikipediaWikidata))
                .map(drop),
            MappingName::Redirects => self
                .redirects
                .get_or_try_init(|| self.read_pairs(MappingName::Redirects))
                .map(drop),
            MappingName::LinkFrequencies => self
                .frequencies
                .get_or_try_init(|| self.read_frequencies())
                .map(drop),
            MappingName::Gender => self.genders.get_or_try_init(|| self.read_genders()).map(drop),
            MappingName::Names => self.names.get_or_try_init(|| self.read_names()).map(drop),
            MappingName::Types => self.types.get_or_try_init(|| self.read_types()).map(drop),
            MappingName::UnigramCounts => self
                .unigrams
                .get_or_try_init(|| self.read_unigrams())
                .map(drop),
        }
    }

    /// Load several mappings.
    pub fn ensure_all<'a, I>(&self, mappings: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a MappingName>,
    {
        mappings.into_iter().try_for_each(|m| self.ensure_loaded(*m))
    }

    fn each_record<F>(&self, mapping: MappingName, mut f: F) -> Result<usize>
    where
        F: FnMut(&Record) -> Result<()>,
    {
        let mut rows = 0;
        for record in self.source.records(mapping)? {
            let record = record?;
            record.columns(mapping)?;
            f(&record)?;
            rows += 1;
        }
        log::info!(
            "Loaded {} rows for mapping {} from {}",
            rows,
            mapping,
            self.source.name()
        );
        Ok(rows)
    }

    fn read_entities(&self) -> Result<HashMap<String, EntityRow>> {
        let mapping = MappingName::Entities;
        let mut table = HashMap::new();
        self.each_record(mapping, |r| {
            let popularity = u32::try_from(r.count(mapping, 2)?).map_err(|_| {
                Error::data_load(mapping, r.line, "popularity out of range")
            })?;
            table.insert(
                r.fields[0].clone(),
                EntityRow {
                    name: r.fields[1].clone(),
                    popularity,
                },
            );
            Ok(())
        })?;
        Ok(table)
    }

    fn read_aliases(&self) -> Result<AliasTable> {
        let mut table = AliasTable::default();
        self.each_record(MappingName::Aliases, |r| {
            let (alias, id) = (&r.fields[0], &r.fields[1]);
            let inserted = table
                .candidates
                .entry(alias.clone())
                .or_default()
                .insert(id.clone());
            if inserted {
                table
                    .by_entity
                    .entry(id.clone())
                    .or_default()
                    .push(alias.clone());
            }
            Ok(())
        })?;
        Ok(table)
    }

    fn read_pairs(&self, mapping: MappingName) -> Result<HashMap<String, String>> {
        let mut table = HashMap::new();
        self.each_record(mapping, |r| {
            table.insert(r.fields[0].clone(), r.fields[1].clone());
            Ok(())
        })?;
        Ok(table)
    }

    fn read_frequencies(&self) -> Result<FrequencyTable> {
        let mapping = MappingName::LinkFrequencies;
        let mut table = FrequencyTable::default();
        let mut unresolved = 0usize;
        let mut unknown = 0usize;
        self.each_record(mapping, |r| {
            let count = r.count(mapping, 2)?;
            let Some(entity_id) = self.link2id(&r.fields[1]) else {
                unresolved += 1;
                return Ok(());
            };
            // With entities loaded, rows must name a knowledge-base entity.
            if self.is_loaded(MappingName::Entities) && !self.contains_entity(&entity_id) {
                unknown += 1;
                return Ok(());
            }
            *table
                .by_alias
                .entry(r.fields[0].clone())
                .or_default()
                .entry(entity_id.clone())
                .or_insert(0) += count;
            *table.by_entity.entry(entity_id).or_insert(0) += count;
            Ok(())
        })?;
        if unresolved > 0 {
            log::debug!("{} link frequency rows name unmapped titles", unresolved);
        }
        if unknown > 0 {
            log::debug!("{} link frequency rows name entities outside the entities table", unknown);
        }
        Ok(table)
    }

    fn read_genders(&self) -> Result<HashMap<String, Gender>> {
        let mut table = HashMap::new();
        self.each_record(MappingName::Gender, |r| {
            table.insert(r.fields[0].clone(), Gender::from_label(&r.fields[1]));
            Ok(())
        })?;
        Ok(table)
    }

    fn read_names(&self) -> Result<NameTable> {
        let mut table = NameTable::default();
        self.each_record(MappingName::Names, |r| {
            let (id, name) = (&r.fields[0], &r.fields[1]);
            let parts: Vec<&str> = name.split_whitespace().collect();
            if parts.len() > 1 {
                let (given, family) = (parts[0], parts[parts.len() - 1]);
                if given.chars().count() > 1 {
                    table.given.insert(id.clone(), given.to_string());
                }
                if family.chars().count() > 1 {
                    table.family.insert(id.clone(), family.to_string());
                }
            }
            table.full.insert(id.clone(), name.clone());
            Ok(())
        })?;
        Ok(table)
    }

    fn read_types(&self) -> Result<HashMap<String, Vec<String>>> {
        let mut table = HashMap::new();
        self.each_record(MappingName::Types, |r| {
            let types = r.fields[1]
                .split(';')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            table.insert(r.fields[0].clone(), types);
            Ok(())
        })?;
        Ok(table)
    }

    fn read_unigrams(&self) -> Result<HashMap<String, u64>> {
        let mapping = MappingName::UnigramCounts;
        let mut table = HashMap::new();
        self.each_record(mapping, |r| {
            table.insert(r.fields[0].clone(), r.count(mapping, 1)?);
            Ok(())
        })?;
        Ok(table)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Candidate entity ids for an alias (exact, case-sensitive match).
    #[must_use]
    pub fn get_candidates(&self, alias: &str) -> BTreeSet<String> {
        self.aliases
            .get()
            .and_then(|t| t.candidates.get(alias))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether an alias is known.
    #[must_use]
    pub fn contains_alias(&self, alias: &str) -> bool {
        self.aliases
            .get()
            .is_some_and(|t| t.candidates.contains_key(alias))
    }

    /// Every known alias, in no particular order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases
            .get()
            .into_iter()
            .flat_map(|t| t.candidates.keys().map(String::as_str))
    }

    /// Aliases of an entity, in source order.
    #[must_use]
    pub fn get_entity_aliases(&self, entity_id: &str) -> &[String] {
        self.aliases
            .get()
            .and_then(|t| t.by_entity.get(entity_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve a Wikipedia title to an entity id.
    ///
    /// Follows at most one redirect: if `title` is unmapped but redirects to
    /// a mapped title, that title's entity is returned. Chained redirects are
    /// not followed.
    #[must_use]
    pub fn link2id(&self, title: &str) -> Option<String> {
        let titles = self.titles.get()?;
        if let Some(id) = titles.get(title) {
            return Some(id.clone());
        }
        let target = self.redirects.get()?.get(title)?;
        titles.get(target).cloned()
    }

    /// How often `alias` linked to `entity_id`.
    #[must_use]
    pub fn get_link_frequency(&self, alias: &str, entity_id: &str) -> u64 {
        self.frequencies
            .get()
            .and_then(|t| t.by_alias.get(alias))
            .and_then(|m| m.get(entity_id))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of anchor frequencies of `alias` over its candidates.
    #[must_use]
    pub fn get_alias_frequency(&self, alias: &str) -> u64 {
        self.aliases
            .get()
            .and_then(|t| t.candidates.get(alias))
            .map(|ids| ids.iter().map(|id| self.get_link_frequency(alias, id)).sum())
            .unwrap_or(0)
    }

    /// Total anchor frequency of an entity.
    #[must_use]
    pub fn get_entity_frequency(&self, entity_id: &str) -> u64 {
        self.frequencies
            .get()
            .and_then(|t| t.by_entity.get(entity_id))
            .copied()
            .unwrap_or(0)
    }

    /// Gender of an entity.
    ///
    /// Entities without a gender row are [`Gender::Neutral`]. If the gender
    /// table was never loaded, a warning is logged once and every entity is
    /// neutral.
    #[must_use]
    pub fn get_gender(&self, entity_id: &str) -> Gender {
        match self.genders.get() {
            Some(table) => table.get(entity_id).copied().unwrap_or_default(),
            None => {
                self.gender_warning.call_once(|| {
                    log::warn!(
                        "Gender lookup before the gender mapping was loaded; assuming neutral"
                    );
                });
                Gender::Neutral
            }
        }
    }

    /// Canonical name: the names table first, then the entities table.
    #[must_use]
    pub fn get_entity_name(&self, entity_id: &str) -> Option<&str> {
        self.names
            .get()
            .and_then(|t| t.full.get(entity_id))
            .or_else(|| {
                self.entities
                    .get()
                    .and_then(|t| t.get(entity_id))
                    .map(|row| &row.name)
            })
            .map(String::as_str)
    }

    /// Type ids of an entity.
    #[must_use]
    pub fn get_entity_types(&self, entity_id: &str) -> &[String] {
        self.types
            .get()
            .and_then(|t| t.get(entity_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Given name derived from a multi-part full name.
    #[must_use]
    pub fn get_given_name(&self, entity_id: &str) -> Option<&str> {
        self.names
            .get()
            .and_then(|t| t.given.get(entity_id))
            .map(String::as_str)
    }

    /// Family name derived from a multi-part full name.
    #[must_use]
    pub fn get_family_name(&self, entity_id: &str) -> Option<&str> {
        self.names
            .get()
            .and_then(|t| t.family.get(entity_id))
            .map(String::as_str)
    }

    /// Corpus unigram count of a token.
    #[must_use]
    pub fn get_unigram_count(&self, token: &str) -> u64 {
        self.unigrams
            .get()
            .and_then(|t| t.get(token))
            .copied()
            .unwrap_or(0)
    }

    /// Whether the entities table lists `entity_id`.
    #[must_use]
    pub fn contains_entity(&self, entity_id: &str) -> bool {
        self.entities
            .get()
            .is_some_and(|t| t.contains_key(entity_id))
    }

    /// Popularity (sitelink count); 0 for unknown entities.
    #[must_use]
    pub fn get_popularity(&self, entity_id: &str) -> u32 {
        self.entities
            .get()
            .and_then(|t| t.get(entity_id))
            .map_or(0, |row| row.popularity)
    }

    /// Assemble an entity record from whatever tables are loaded.
    ///
    /// Returns `None` if the entity has no canonical name.
    #[must_use]
    pub fn entity(&self, entity_id: &str) -> Option<WikidataEntity> {
        let name = self.get_entity_name(entity_id)?;
        let mut entity = WikidataEntity::new(entity_id, name, self.get_popularity(entity_id));
        entity.synonyms = self.get_entity_aliases(entity_id).to_vec();
        entity.types = self.get_entity_types(entity_id).to_vec();
        entity.gender = self
            .genders
            .get()
            .and_then(|t| t.get(entity_id))
            .copied()
            .unwrap_or_default();
        Some(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::InMemorySource;

    fn database() -> EntityDatabase {
        let source = InMemorySource::new()
            .entity("Q90", "Paris", 300)
            .entity("Q167646", "Paris", 40)
            .alias("Paris", "Q90")
            .alias("Paris", "Q167646")
            .alias("City of Light", "Q90")
            .title("Paris", "Q90")
            .title("Paris (mythology)", "Q167646")
            .redirect("Paname", "Paris")
            .redirect("Lutetia", "Paname")
            .link_frequency("Paris", "Paris", 90)
            .link_frequency("Paris", "Paris (mythology)", 5)
            .link_frequency("Paris", "Paname", 10)
            .link_frequency("Paris", "Nowhere", 7)
            .title("Paris, Texas", "Q830149")
            .link_frequency("Paris", "Paris, Texas", 3)
            .gender("Q7259", "female")
            .name("Q7259", "Ada Lovelace")
            .name("Q1", "J Doe")
            .types("Q7259", &["Q5"]);
        EntityDatabase::new(source)
    }

    #[test]
    fn test_link2id_follows_one_redirect() {
        let db = database();
        db.ensure_loaded(MappingName::WikipediaWikidata).unwrap();
        db.ensure_loaded(MappingName::Redirects).unwrap();
        assert_eq!(db.link2id("Paris").as_deref(), Some("Q90"));
        assert_eq!(db.link2id("Paname").as_deref(), Some("Q90"));
        // Lutetia -> Paname -> Paris is two hops.
        assert_eq!(db.link2id("Lutetia"), None);
        assert_eq!(db.link2id("Atlantis"), None);
    }

    #[test]
    fn test_frequencies_load_title_mappings_first() {
        let db = database();
        db.ensure_loaded(MappingName::LinkFrequencies).unwrap();
        assert!(db.is_loaded(MappingName::WikipediaWikidata));
        assert!(db.is_loaded(MappingName::Redirects));
        // Direct and redirected rows accumulate on the same entity.
        assert_eq!(db.get_link_frequency("Paris", "Q90"), 100);
        assert_eq!(db.get_entity_frequency("Q90"), 100);
        assert_eq!(db.get_entity_frequency("Q167646"), 5);
    }

    #[test]
    fn test_frequencies_skip_entities_outside_the_table() {
        let db = database();
        db.ensure_loaded(MappingName::LinkFrequencies).unwrap();
        assert_eq!(db.get_link_frequency("Paris", "Q830149"), 3);

        let db = database();
        db.ensure_all(&[MappingName::Entities, MappingName::LinkFrequencies])
            .unwrap();
        assert!(db.contains_entity("Q90"));
        assert!(!db.contains_entity("Q830149"));
        assert_eq!(db.get_link_frequency("Paris", "Q830149"), 0);
        assert_eq!(db.get_entity_frequency("Q830149"), 0);
        assert_eq!(db.get_link_frequency("Paris", "Q90"), 100);
    }

    #[test]
    fn test_alias_frequency_sums_candidates() {
        let db = database();
        db.ensure_all(&[MappingName::Aliases, MappingName::LinkFrequencies])
            .unwrap();
        assert_eq!(db.get_alias_frequency("Paris"), 105);
        assert_eq!(db.get_alias_frequency("City of Light"), 0);
        assert_eq!(db.get_alias_frequency("Rome"), 0);
        assert_eq!(db.get_candidates("Paris").len(), 2);
        assert!(db.get_candidates("paris").is_empty());
        assert_eq!(db.get_entity_aliases("Q90"), ["Paris", "City of Light"]);
    }

    #[test]
    fn test_gender_defaults() {
        let db = database();
        assert_eq!(db.get_gender("Q7259"), Gender::Neutral);
        db.ensure_loaded(MappingName::Gender).unwrap();
        assert_eq!(db.get_gender("Q7259"), Gender::Female);
        assert_eq!(db.get_gender("Q90"), Gender::Neutral);
    }

    #[test]
    fn test_names_derive_given_and_family() {
        let db = database();
        db.ensure_loaded(MappingName::Names).unwrap();
        assert_eq!(db.get_given_name("Q7259"), Some("Ada"));
        assert_eq!(db.get_family_name("Q7259"), Some("Lovelace"));
        // Single-letter parts are not names.
        assert_eq!(db.get_given_name("Q1"), None);
        assert_eq!(db.get_family_name("Q1"), Some("Doe"));
    }

    #[test]
    fn test_load_is_idempotent() {
        let db = database();
        db.ensure_loaded(MappingName::Aliases).unwrap();
        db.ensure_loaded(MappingName::Aliases).unwrap();
        assert_eq!(db.get_candidates("Paris").len(), 2);
    }

    #[test]
    fn test_malformed_row_is_fatal_and_leaves_mapping_unloaded() {
        let source = InMemorySource::new()
            .unigram("the", 100)
            .row(MappingName::UnigramCounts, ["of", "lots"]);
        let db = EntityDatabase::new(source);
        let err = db.ensure_loaded(MappingName::UnigramCounts).unwrap_err();
        assert!(matches!(err, Error::DataLoad { line: 2, .. }));
        assert!(!db.is_loaded(MappingName::UnigramCounts));
    }

    #[test]
    fn test_entity_assembles_loaded_tables() {
        let db = database();
        db.ensure_all(&[MappingName::Entities, MappingName::Aliases])
            .unwrap();
        let paris = db.entity("Q90").unwrap();
        assert_eq!(paris.name, "Paris");
        assert_eq!(paris.popularity, 300);
        assert_eq!(paris.synonyms, vec!["Paris", "City of Light"]);
        assert!(db.entity("Q404").is_none());
    }
}
