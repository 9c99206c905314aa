//! Hyperlink/reference linking: a document's own links as seed evidence.
//!
//! # Phase 1: seed
//!
//! The article title, bold title self-references and every hyperlink target
//! are resolved with [`EntityDatabase::link2id`]. Each resolved anchor becomes
//! a mention, after adjusting its span:
//!
//! 1. drop a trailing `'s` / `'` unless the target title ends that way
//! 2. grow to the full target title if the text continues with it
//! 3. grow to the end of the current word
//!
//! The anchor text and the entity's (non-lowercase) aliases are remembered,
//! plus middle-initial variants for people.
//!
//! # Phase 2: propagate
//!
//! Anchor texts, then synonyms, each longest first, are searched for in the
//! whole text. An occurrence is skipped if it starts mid-word, needs more
//! than a few characters to reach a word boundary, touches an already
//! covered position, or is a sentence-initial single word whose tags say it
//! is probably not a name.

use super::alias_matcher::is_all_lowercase;
use super::{EntityLinker, StageOutcome};
use crate::annotate::Annotation;
use crate::config::LinkerConfig;
use crate::conflict::{ConflictStrategy, CoveredPositions};
use crate::coref::pronouns::is_pronoun;
use crate::error::Result;
use crate::kb::EntityDatabase;
use crate::offset::CharText;
use kblink_core::{Article, EntityMention, Span};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Stage identifier for detection.
pub const RECOGNIZER: &str = "Hyperlink Reference Linker";
/// Link source for seeded hyperlink mentions.
pub const HYPERLINK: &str = "HRL: Hyperlink";
/// Link source for propagated mentions.
pub const REFERENCE: &str = "HRL Reference";

static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" \([^)]*?\)").expect("bracket pattern is valid"));

const TRIMMED_ENDINGS: &[&str] = &["'s", "'"];

/// Insertion-ordered string → entity id map.
#[derive(Debug, Default)]
struct SynonymMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl SynonymMap {
    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or overwrite, keeping the original position.
    fn insert(&mut self, key: String, entity_id: String) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = entity_id,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, entity_id));
            }
        }
    }

    fn insert_if_absent(&mut self, key: String, entity_id: String) {
        if !self.contains(&key) {
            self.insert(key, entity_id);
        }
    }

    /// Entries, longest key first; equal lengths keep insertion order.
    fn longest_first(self) -> Vec<(String, String)> {
        let mut entries = self.entries;
        entries.sort_by_key(|(key, _)| std::cmp::Reverse(key.chars().count()));
        entries
    }
}

/// Hyperlink seeding plus propagation over the article text.
#[derive(Debug)]
pub struct HyperlinkReferenceLinker {
    db: Arc<EntityDatabase>,
    person_type: String,
    fictional_character_type: String,
    organization_type: String,
    max_word_extension: usize,
}

impl HyperlinkReferenceLinker {
    /// Create the stage.
    #[must_use]
    pub fn new(db: Arc<EntityDatabase>, config: &LinkerConfig) -> Self {
        Self {
            db,
            person_type: config.person_type.clone(),
            fictional_character_type: config.fictional_character_type.clone(),
            organization_type: config.organization_type.clone(),
            max_word_extension: config.max_word_extension,
        }
    }

    fn add_synonyms(&self, entity_id: &str, synonyms: &mut SynonymMap) {
        for alias in self.db.get_entity_aliases(entity_id) {
            // Lowercase aliases such as "it" for Italy are too ambiguous.
            if !is_all_lowercase(alias) {
                synonyms.insert_if_absent(alias.clone(), entity_id.to_string());
            }
        }
        for variant in self.middle_name_variants(entity_id) {
            synonyms.insert(variant, entity_id.to_string());
        }
    }

    /// Name variants without (or with abbreviated) middle names:
    /// "Habern William Archibald Freeman" → "Habern Freeman",
    /// "Habern W A Freeman", "Habern W.A. Freeman", "Habern W. A. Freeman".
    ///
    /// Only for people and fictional characters that are not also
    /// organizations (bands are sometimes typed as both).
    fn middle_name_variants(&self, entity_id: &str) -> Vec<String> {
        let types = self.db.get_entity_types(entity_id);
        let is_person = types
            .iter()
            .any(|t| *t == self.person_type || *t == self.fictional_character_type);
        if !is_person || types.iter().any(|t| *t == self.organization_type) {
            return Vec::new();
        }
        let Some(name) = self.db.get_entity_name(entity_id) else {
            return Vec::new();
        };
        let parts: Vec<&str> = name.split(' ').collect();
        // Lowercase middle parts mean "Karl I of Austria", not middle names.
        let capitalized = parts
            .iter()
            .filter(|p| !p.is_empty())
            .all(|p| p.chars().next().is_some_and(char::is_uppercase));
        if parts.len() <= 2 || !capitalized {
            return Vec::new();
        }
        let (first, last) = (parts[0], parts[parts.len() - 1]);
        let initials: Vec<char> = parts[1..parts.len() - 1]
            .iter()
            .filter_map(|p| p.chars().next())
            .collect();
        let spaced: Vec<String> = initials.iter().map(char::to_string).collect();
        let dotted: Vec<String> = initials.iter().map(|c| format!("{c}.")).collect();
        [
            String::new(),
            format!("{} ", spaced.join(" ")),
            format!("{} ", dotted.concat()),
            format!("{} ", dotted.join(" ")),
        ]
        .into_iter()
        .map(|middle| format!("{first} {middle}{last}"))
        .collect()
    }

    /// Apply the seed span adjustments; `None` if nothing is left.
    fn seed_span(text: &CharText<'_>, span: Span, target: &str) -> Option<Span> {
        let anchor = text.span_text(&span);
        let mut end = span.end;
        if let Some(ending) = TRIMMED_ENDINGS
            .iter()
            .find(|e| anchor.ends_with(*e) && !target.ends_with(*e))
        {
            end = end.saturating_sub(ending.chars().count());
        }
        let target_end = span.start + target.chars().count();
        if target_end > end && target_end <= text.len() && text.slice(span.start, target_end) == target {
            end = target_end;
        }
        while end < text.len() && text.is_alpha_at(end) {
            end += 1;
        }
        Span::new(span.start, end).ok()
    }

    /// Capitalization carries no signal at sentence start: only accept a
    /// single sentence-initial word tagged as noun/adjective or as a
    /// (non-pronoun) subject.
    fn plausible_at(annotation: &Annotation, start: usize, needle: &str) -> bool {
        if start == 0 || needle.contains(' ') || !annotation.starts_sentence(start) {
            return true;
        }
        match annotation.token_at(start) {
            Some(token) => {
                token.tag.starts_with("NN")
                    || token.tag.starts_with("JJ")
                    || (token.dep.starts_with("nsubj") && !is_pronoun(&token.text))
            }
            None => true,
        }
    }
}

impl EntityLinker for HyperlinkReferenceLinker {
    fn name(&self) -> &'static str {
        RECOGNIZER
    }

    fn link_entities(&self, article: &mut Article, annotation: &Annotation) -> Result<StageOutcome> {
        let text = CharText::new(article.text());
        let mut outcome = StageOutcome::default();
        let mut links = SynonymMap::default();
        let mut synonyms = SynonymMap::default();
        let mut covered = CoveredPositions::new(ConflictStrategy::RejectOverlap);
        let mut seeded: Vec<String> = Vec::new();

        // Phase 1: title, bold title spans, hyperlinks.
        let mut seeds: Vec<(Span, &str)> = Vec::new();
        if let Some(title_id) = self.db.link2id(&article.title) {
            links.insert(article.title.clone(), title_id.clone());
            self.add_synonyms(&title_id, &mut synonyms);
            let bracketless = BRACKETED.replace_all(&article.title, "");
            if bracketless != article.title {
                synonyms.insert_if_absent(bracketless.into_owned(), title_id.clone());
            }
            seeds.extend(article.title_synonyms.iter().map(|s| (*s, article.title.as_str())));
            seeded.push(title_id);
        }
        seeds.extend(article.hyperlinks.iter().map(|h| (h.span, h.target.as_str())));

        for (span, target) in seeds {
            // Bold title spans may overlap hyperlinks.
            if span.end > text.len() || covered.is_covered(&span) {
                continue;
            }
            let Some(entity_id) = self.db.link2id(target) else {
                outcome.unresolved += 1;
                continue;
            };
            links.insert(text.span_text(&span).to_string(), entity_id.clone());
            self.add_synonyms(&entity_id, &mut synonyms);
            let Some(adjusted) = Self::seed_span(&text, span, target) else {
                continue;
            };
            let mention = EntityMention::new(adjusted, RECOGNIZER)
                .linked(entity_id.clone(), HYPERLINK)
                .with_candidates([entity_id.clone()]);
            if covered.try_add(adjusted, mention).is_accepted() {
                seeded.push(entity_id);
            }
        }

        // Given names act as synonyms; the first entity with a name keeps it.
        for entity_id in &seeded {
            if let Some(given) = self.db.get_given_name(entity_id) {
                synonyms.insert_if_absent(given.to_string(), entity_id.clone());
            }
        }

        // Phase 2: propagate, longest strings first.
        let needles = links
            .longest_first()
            .into_iter()
            .chain(synonyms.longest_first());
        for (needle, entity_id) in needles {
            if needle.is_empty() {
                continue;
            }
            let needle_len = needle.chars().count();
            let mut from = 0;
            while let Some(start) = text.find(&needle, from) {
                if start > 0 && text.is_alpha_at(start - 1) {
                    from = start + 1;
                    continue;
                }
                let mut end = start + needle_len;
                let mut extension = 0;
                let mut overgrown = false;
                while end < text.len() && text.is_alpha_at(end) {
                    // "Waldeck" must not grow into "Waldeckerinnen".
                    if extension >= self.max_word_extension || extension >= needle_len {
                        overgrown = true;
                    }
                    end += 1;
                    extension += 1;
                }
                from = end;
                if overgrown {
                    continue;
                }
                let span = Span { start, end };
                if covered.is_covered(&span) || !Self::plausible_at(annotation, start, &needle) {
                    continue;
                }
                let mention = EntityMention::new(span, RECOGNIZER)
                    .linked(entity_id.clone(), REFERENCE)
                    .with_candidates([entity_id.clone()]);
                covered.try_add(span, mention);
            }
        }

        outcome.added = article.add_mentions(covered.into_values());
        Ok(outcome)
    }
}
