//! Row sources for knowledge-base mappings.

use super::MappingName;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One raw row of a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line (or row) number, for error messages.
    pub line: usize,
    /// Column values.
    pub fields: Vec<String>,
}

impl Record {
    /// Check the column count for `mapping` and return the fields.
    pub fn columns(&self, mapping: MappingName) -> Result<&[String]> {
        let expected = mapping.columns();
        if self.fields.len() != expected {
            return Err(Error::data_load(
                mapping,
                self.line,
                format!("expected {} columns, found {}", expected, self.fields.len()),
            ));
        }
        Ok(&self.fields)
    }

    /// Parse column `idx` as a non-negative count.
    pub fn count(&self, mapping: MappingName, idx: usize) -> Result<u64> {
        let raw = self.columns(mapping)?[idx].trim();
        raw.parse::<u64>().map_err(|e| {
            Error::data_load(mapping, self.line, format!("invalid count {:?}: {}", raw, e))
        })
    }
}

/// Iterator over the rows of one mapping.
pub type Records<'a> = Box<dyn Iterator<Item = Result<Record>> + 'a>;

/// A provider of key/value rows per mapping.
///
/// Implementations only deliver rows; column validation and table building
/// happen in [`EntityDatabase`](super::EntityDatabase).
pub trait KnowledgeSource: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> String;

    /// Rows of a mapping.
    fn records(&self, mapping: MappingName) -> Result<Records<'_>>;
}

// =============================================================================
// In-memory source
// =============================================================================

/// Rows held in memory, assembled with a builder.
///
/// ```rust
/// use kblink::kb::InMemorySource;
///
/// let source = InMemorySource::new()
///     .entity("Q90", "Paris", 300)
///     .alias("Paris", "Q90")
///     .title("Paris", "Q90");
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    rows: HashMap<MappingName, Vec<Vec<String>>>,
}

impl InMemorySource {
    /// Create an empty source. Every mapping is present but has no rows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw row to a mapping.
    #[must_use]
    pub fn row<I, S>(mut self, mapping: MappingName, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows
            .entry(mapping)
            .or_default()
            .push(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Add an entity with its canonical name and popularity.
    #[must_use]
    pub fn entity(self, entity_id: &str, name: &str, popularity: u32) -> Self {
        let popularity = popularity.to_string();
        self.row(MappingName::Entities, [entity_id, name, popularity.as_str()])
    }

    /// Add an alias of an entity.
    #[must_use]
    pub fn alias(self, alias: &str, entity_id: &str) -> Self {
        self.row(MappingName::Aliases, [alias, entity_id])
    }

    /// Map a Wikipedia title to an entity.
    #[must_use]
    pub fn title(self, title: &str, entity_id: &str) -> Self {
        self.row(MappingName::WikipediaWikidata, [title, entity_id])
    }

    /// Add a redirect between titles.
    #[must_use]
    pub fn redirect(self, source: &str, target: &str) -> Self {
        self.row(MappingName::Redirects, [source, target])
    }

    /// Record how often `anchor` linked to the page `target_title`.
    #[must_use]
    pub fn link_frequency(self, anchor: &str, target_title: &str, count: u64) -> Self {
        let count = count.to_string();
        self.row(
            MappingName::LinkFrequencies,
            [anchor, target_title, count.as_str()],
        )
    }

    /// Set an entity's gender label.
    #[must_use]
    pub fn gender(self, entity_id: &str, label: &str) -> Self {
        self.row(MappingName::Gender, [entity_id, label])
    }

    /// Set an entity's full name.
    #[must_use]
    pub fn name(self, entity_id: &str, full_name: &str) -> Self {
        self.row(MappingName::Names, [entity_id, full_name])
    }

    /// Set an entity's type ids.
    #[must_use]
    pub fn types(self, entity_id: &str, types: &[&str]) -> Self {
        let joined = types.join(";");
        self.row(MappingName::Types, [entity_id, joined.as_str()])
    }

    /// Set a corpus unigram count.
    #[must_use]
    pub fn unigram(self, token: &str, count: u64) -> Self {
        let count = count.to_string();
        self.row(MappingName::UnigramCounts, [token, count.as_str()])
    }
}

impl KnowledgeSource for InMemorySource {
    fn name(&self) -> String {
        "in-memory".to_string()
    }

    fn records(&self, mapping: MappingName) -> Result<Records<'_>> {
        let rows = self.rows.get(&mapping).map(Vec::as_slice).unwrap_or(&[]);
        Ok(Box::new(rows.iter().enumerate().map(|(i, fields)| {
            Ok(Record {
                line: i + 1,
                fields: fields.clone(),
            })
        })))
    }
}

// =============================================================================
// TSV directory source
// =============================================================================

/// A directory of UTF-8 tab-separated files, one per mapping
/// (see [`MappingName::file_name`]). Empty lines are skipped.
#[derive(Debug, Clone)]
pub struct TsvSource {
    dir: PathBuf,
}

impl TsvSource {
    /// Read mappings from `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of a mapping's file.
    #[must_use]
    pub fn path(&self, mapping: MappingName) -> PathBuf {
        self.dir.join(mapping.file_name())
    }
}

impl KnowledgeSource for TsvSource {
    fn name(&self) -> String {
        self.dir.display().to_string()
    }

    fn records(&self, mapping: MappingName) -> Result<Records<'_>> {
        let path = self.path(mapping);
        let file = File::open(&path).map_err(|e| {
            Error::data_load(mapping, 0, format!("cannot open {}: {}", path.display(), e))
        })?;
        let lines = BufReader::new(file).lines().enumerate();
        Ok(Box::new(lines.filter_map(move |(i, line)| {
            let line_no = i + 1;
            match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(Ok(Record {
                    line: line_no,
                    fields: line.split('\t').map(str::to_string).collect(),
                })),
                Err(e) => Some(Err(Error::data_load(mapping, line_no, e.to_string()))),
            }
        })))
    }
}
