//! Greedy longest-match mention detection over a filtered alias table.
//!
//! # Build
//!
//! The table keeps an alias only if it looks like a name: not empty, not a
//! stopword or month/determiner, not numeric or a date, capitalized, linked
//! at least as often as the lowercase word occurs in running text, and not a
//! determiner-prefixed duplicate ("the Beatles" when "Beatles" exists). A
//! trailing `'s` is dropped. Each surviving alias maps to its summed anchor
//! frequency.
//!
//! # Match
//!
//! ```text
//! text:    New York City is big
//! splits: -1   3    8    13 16  20        (non-alphanumeric chars + sentinels)
//!
//! at split -1 try 20, 19, ... 1 tokens: "New York City" ∈ table → [0,13)
//! jump to split 13, continue
//! ```
//!
//! One pass, O(n · max_tokens) lookups, yielding maximal non-overlapping
//! matches.

use super::{best_candidate, EntityLinker, StageOutcome};
use crate::annotate::Annotation;
use crate::config::LinkerConfig;
use crate::conflict::{ConflictStrategy, CoveredPositions};
use crate::error::Result;
use crate::kb::EntityDatabase;
use crate::offset::CharText;
use kblink_core::{Article, EntityMention, Span, UNKNOWN_ENTITY};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Stage identifier for detection.
pub const RECOGNIZER: &str = "Greedy Alias Matcher";
/// Stage identifier for disambiguation.
pub const LINKER: &str = "Alias Prior";

const EXCLUDED: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December", "The", "A", "An", "It",
];

const REMOVED_PREFIXES: &[&str] = &["a ", "an ", "the ", "in ", "at "];

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let month = "(?:January|February|March|April|May|June|July|August|September|October|November|December)";
    Regex::new(&format!(
        r"^(?:\d{{1,2}} {m}(?: \d{{1,4}})?|{m} \d{{1,2}}(?:, \d{{1,4}})?|{m} \d{{3,4}}|\d{{4}}-\d{{2}}-\d{{2}}|\d{{1,2}}/\d{{1,2}}/\d{{2,4}}|\d{{3,4}}s?|\d{{1,2}}(?:st|nd|rd|th) century)$",
        m = month
    ))
    .expect("date pattern is valid")
});

/// Whether a string is a calendar date or year expression.
#[must_use]
pub fn is_date(text: &str) -> bool {
    DATE_PATTERN.is_match(text)
}

/// `text` with its first character lowercased.
fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Has a cased character and every cased character is lowercase.
pub(crate) fn is_all_lowercase(text: &str) -> bool {
    text.chars().any(char::is_lowercase) && !text.chars().any(char::is_uppercase)
}

// =============================================================================
// Alias table
// =============================================================================

/// Aliases eligible for greedy matching, with their anchor frequencies.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    frequencies: HashMap<String, u64>,
}

impl AliasTable {
    /// Build from explicit `(alias, frequency)` pairs, without filtering.
    pub fn from_frequencies<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self {
            frequencies: pairs.into_iter().map(|(a, f)| (a.into(), f)).collect(),
        }
    }

    /// Build the filtered table from the knowledge base.
    ///
    /// Needs the aliases, link frequency and unigram count mappings.
    #[must_use]
    pub fn from_database(db: &EntityDatabase, stopwords: &HashSet<String>) -> Self {
        let mut frequencies = HashMap::new();
        for alias in db.aliases() {
            if let Some(kept) = Self::filter_alias(db, stopwords, alias) {
                let frequency = db.get_alias_frequency(kept);
                if kept.chars().count() > 1 && frequency > 0 {
                    frequencies.insert(kept.to_string(), frequency);
                }
            }
        }
        log::info!("Alias table holds {} aliases", frequencies.len());
        Self { frequencies }
    }

    /// The form of `alias` to keep, or `None` if it is not name-like.
    fn filter_alias<'a>(
        db: &EntityDatabase,
        stopwords: &HashSet<String>,
        alias: &'a str,
    ) -> Option<&'a str> {
        let first = alias.chars().next()?;
        let lowercased = lowercase_first(alias);
        let prefixed_duplicate = REMOVED_PREFIXES.iter().any(|prefix| {
            lowercased.starts_with(prefix)
                && (first.is_lowercase()
                    || alias.get(prefix.len()..).is_some_and(|rest| db.contains_alias(rest)))
        });
        if prefixed_duplicate {
            return None;
        }
        if let Some(last) = alias.chars().last() {
            let trimmed = &alias[..alias.len() - last.len_utf8()];
            if !last.is_alphanumeric() && db.contains_alias(trimmed) {
                return None;
            }
        }
        if alias.chars().all(char::is_numeric) || is_date(alias) || first.is_lowercase() {
            return None;
        }
        if db.get_alias_frequency(alias) < db.get_unigram_count(&lowercased) {
            return None;
        }
        if alias.ends_with(" the") {
            return None;
        }
        let kept = alias.strip_suffix("'s").unwrap_or(alias);
        if stopwords.contains(&lowercased)
            || EXCLUDED.contains(&kept)
            || !kept.chars().any(char::is_uppercase)
        {
            return None;
        }
        Some(kept)
    }

    /// Whether an exact string is in the table.
    #[must_use]
    pub fn contains(&self, alias: &str) -> bool {
        self.frequencies.contains_key(alias)
    }

    /// Anchor frequency of an alias; 0 if absent.
    #[must_use]
    pub fn frequency(&self, alias: &str) -> u64 {
        self.frequencies.get(alias).copied().unwrap_or(0)
    }

    /// Number of aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Greedy longest matches of table aliases in `text`.
    #[must_use]
    pub fn find_matches(&self, text: &str, max_tokens: usize) -> Vec<Span> {
        self.find_in(&CharText::new(text), max_tokens)
    }

    pub(crate) fn find_in(&self, text: &CharText<'_>, max_tokens: usize) -> Vec<Span> {
        // bounds[k] = split point k + 1, so the -1 sentinel becomes 0.
        let mut bounds = vec![0];
        bounds.extend(
            text.chars()
                .iter()
                .enumerate()
                .filter(|(_, c)| !c.is_alphanumeric())
                .map(|(i, _)| i + 1),
        );
        bounds.push(text.len() + 1);

        let n = bounds.len();
        let mut spans = Vec::new();
        let mut i = 0;
        while i + 1 < n {
            let start = bounds[i];
            let mut advance = 1;
            for tokens in (1..=max_tokens.min(n - i - 1)).rev() {
                let end = bounds[i + tokens] - 1;
                if end > start && self.contains(text.slice(start, end)) {
                    spans.push(Span { start, end });
                    advance = tokens;
                    break;
                }
            }
            i += advance;
        }
        spans
    }
}

// =============================================================================
// Linker
// =============================================================================

/// Primary stage: greedy alias detection plus prior-based disambiguation.
#[derive(Debug)]
pub struct AliasMatcherLinker {
    db: Arc<EntityDatabase>,
    table: AliasTable,
    max_tokens: usize,
    uppercase_only: bool,
}

impl AliasMatcherLinker {
    /// Build the alias table from a loaded knowledge base.
    pub fn new(db: Arc<EntityDatabase>, config: &LinkerConfig) -> Result<Self> {
        let stopwords = config.stopwords()?;
        let table = AliasTable::from_database(&db, &stopwords);
        Ok(Self::with_table(db, table, config))
    }

    /// Use a prepared table.
    #[must_use]
    pub fn with_table(db: Arc<EntityDatabase>, table: AliasTable, config: &LinkerConfig) -> Self {
        Self {
            db,
            table,
            max_tokens: config.max_alias_tokens,
            uppercase_only: config.uppercase_only,
        }
    }

    /// The alias table.
    #[must_use]
    pub fn table(&self) -> &AliasTable {
        &self.table
    }
}

impl EntityLinker for AliasMatcherLinker {
    fn name(&self) -> &'static str {
        RECOGNIZER
    }

    fn link_entities(&self, article: &mut Article, _annotation: &Annotation) -> Result<StageOutcome> {
        let text = CharText::new(article.text());
        let mut covered = CoveredPositions::new(ConflictStrategy::LongestSpan);
        for span in self.table.find_in(&text, self.max_tokens) {
            let snippet = text.span_text(&span);
            if self.uppercase_only && is_all_lowercase(snippet) {
                continue;
            }
            covered.try_add(span, snippet.to_string());
        }

        let mut outcome = StageOutcome::default();
        for (span, snippet) in covered.iter() {
            let candidates = self.db.get_candidates(snippet);
            let entity_id = best_candidate(&self.db, snippet, &candidates);
            let resolved = entity_id.is_some();
            let mention = EntityMention::new(*span, RECOGNIZER)
                .linked(entity_id.unwrap_or_else(|| UNKNOWN_ENTITY.to_string()), LINKER)
                .with_candidates(candidates);
            if article.add_mention(mention) {
                outcome.added += 1;
                if !resolved {
                    outcome.unresolved += 1;
                }
            }
        }
        Ok(outcome)
    }
}
