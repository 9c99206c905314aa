//! Replay of precomputed linking results.
//!
//! One JSON object per line:
//!
//! ```json
//! {"id": 7, "predictions": [{"entity_reference": "Q90", "start_char": 0, "end_char": 5,
//!                            "candidates": ["Q90", "Paris (mythology)"]}]}
//! ```
//!
//! `entity_reference` and candidates are either entity ids (`Q…`) or
//! Wikipedia titles, which are resolved with one-hop [`EntityDatabase::link2id`].
//! Lines without `id` belong to the article whose id equals the line's
//! 0-based position among non-empty lines.
//!
//! Overlapping predictions are settled in file order with the longest-span
//! policy, so the result depends on the order of the input.

use super::{EntityLinker, StageOutcome};
use crate::annotate::Annotation;
use crate::config::LinkerConfig;
use crate::conflict::{ConflictStrategy, CoveredPositions};
use crate::error::{Error, Result};
use crate::kb::EntityDatabase;
use crate::linkers::alias_matcher::is_all_lowercase;
use crate::offset::CharText;
use kblink_core::{Article, EntityMention, Span, UNKNOWN_ENTITY};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

/// Stage identifier, used for both detection and linking.
pub const IDENTIFIER: &str = "Prediction Replay";

static ENTITY_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Q\d+$").expect("id pattern is valid"));

#[derive(Debug, Clone, Deserialize)]
struct PredictionLine {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    predictions: Vec<Prediction>,
}

/// One predicted mention.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Prediction {
    /// Entity id or Wikipedia title.
    pub entity_reference: String,
    /// Start character offset.
    pub start_char: usize,
    /// End character offset (exclusive).
    pub end_char: usize,
    /// Candidate ids or titles.
    #[serde(default)]
    pub candidates: Vec<String>,
}

/// Primary stage that replays predictions from a file.
#[derive(Debug)]
pub struct PredictionReplayLinker {
    db: Arc<EntityDatabase>,
    by_article: HashMap<u64, Vec<Prediction>>,
    uppercase_only: bool,
}

impl PredictionReplayLinker {
    /// Read predictions from JSONL.
    pub fn from_reader(db: Arc<EntityDatabase>, config: &LinkerConfig, reader: impl BufRead) -> Result<Self> {
        let mut by_article = HashMap::new();
        let mut position = 0u64;
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: PredictionLine = serde_json::from_str(&line)
                .map_err(|e| Error::prediction(format!("line {}: {}", i + 1, e)))?;
            if let Some(bad) = parsed.predictions.iter().find(|p| p.start_char >= p.end_char) {
                return Err(Error::prediction(format!(
                    "line {}: empty span [{}, {})",
                    i + 1,
                    bad.start_char,
                    bad.end_char
                )));
            }
            by_article.insert(parsed.id.unwrap_or(position), parsed.predictions);
            position += 1;
        }
        log::info!("Loaded predictions for {} articles", by_article.len());
        Ok(Self {
            db,
            by_article,
            uppercase_only: config.uppercase_only,
        })
    }

    /// Read predictions from a JSONL file.
    pub fn from_file(db: Arc<EntityDatabase>, config: &LinkerConfig, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| Error::prediction(format!("cannot open {}: {}", path.display(), e)))?;
        Self::from_reader(db, config, std::io::BufReader::new(file))
    }

    fn resolve(&self, reference: &str) -> Option<String> {
        if ENTITY_ID.is_match(reference) {
            Some(reference.to_string())
        } else {
            self.db.link2id(reference)
        }
    }
}

impl EntityLinker for PredictionReplayLinker {
    fn name(&self) -> &'static str {
        IDENTIFIER
    }

    fn link_entities(&self, article: &mut Article, _annotation: &Annotation) -> Result<StageOutcome> {
        let Some(predictions) = self.by_article.get(&article.id) else {
            return Ok(StageOutcome::default());
        };
        let text = CharText::new(article.text());
        let mut outcome = StageOutcome::default();
        let mut covered = CoveredPositions::new(ConflictStrategy::LongestSpan);
        for prediction in predictions {
            if prediction.end_char > text.len() {
                return Err(Error::prediction(format!(
                    "article {}: prediction [{}, {}) exceeds text length {}",
                    article.id,
                    prediction.start_char,
                    prediction.end_char,
                    text.len()
                )));
            }
            let span = Span::new(prediction.start_char, prediction.end_char)?;
            if self.uppercase_only && is_all_lowercase(text.span_text(&span)) {
                continue;
            }
            covered.try_add(span, prediction);
        }

        let mut mentions = Vec::with_capacity(covered.len());
        for (span, prediction) in covered.iter() {
            let entity_id = match self.resolve(&prediction.entity_reference) {
                Some(id) => id,
                None => {
                    log::warn!(
                        "Article {}: no entity for prediction {:?}",
                        article.id,
                        prediction.entity_reference
                    );
                    outcome.unresolved += 1;
                    UNKNOWN_ENTITY.to_string()
                }
            };
            let candidates: BTreeSet<String> = prediction
                .candidates
                .iter()
                .filter_map(|c| self.resolve(c))
                .collect();
            mentions.push(
                EntityMention::new(*span, IDENTIFIER)
                    .linked(entity_id, IDENTIFIER)
                    .with_candidates(candidates),
            );
        }
        outcome.added = article.add_mentions(mentions);
        Ok(outcome)
    }
}
