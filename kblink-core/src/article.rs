//! Articles: immutable text plus a span-keyed mention store.
//!
//! An [`Article`] is created by a document reader, mutated only by linker
//! stages appending mentions, and finally serialized as one JSON line:
//!
//! ```json
//! {"id": 7, "title": "Ada Lovelace", "text": "...",
//!  "entity_mentions": [{"span": [0, 12], "recognized_by": "...", "id": "Q7259", ...}]}
//! ```
//!
//! # Append-only mentions
//!
//! Mentions are keyed by span and iterate in span order. A stage may add a
//! mention only where no earlier (non-`contained`) mention overlaps it;
//! existing mentions are never removed and their links are never replaced.

use crate::error::{Error, Result};
use crate::mention::EntityMention;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A hyperlink in the source document: anchor span and target page title.
///
/// Serialized as `[[start, end], "Target title"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Span, String)", into = "(Span, String)")]
pub struct Hyperlink {
    /// Anchor text span.
    pub span: Span,
    /// Target Wikipedia title.
    pub target: String,
}

impl Hyperlink {
    /// Create a hyperlink.
    #[must_use]
    pub fn new(span: Span, target: impl Into<String>) -> Self {
        Self {
            span,
            target: target.into(),
        }
    }
}

impl From<(Span, String)> for Hyperlink {
    fn from((span, target): (Span, String)) -> Self {
        Self { span, target }
    }
}

impl From<Hyperlink> for (Span, String) {
    fn from(link: Hyperlink) -> Self {
        (link.span, link.target)
    }
}

/// A document with its annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ArticleRecord", into = "ArticleRecord")]
pub struct Article {
    /// Document identifier.
    pub id: u64,
    /// Document title (a Wikipedia title for Wikipedia articles, else empty).
    pub title: String,
    text: String,
    char_len: usize,
    /// Hyperlinks in document order.
    pub hyperlinks: Vec<Hyperlink>,
    /// Bold self-references to the article title ("title synonyms").
    pub title_synonyms: Vec<Span>,
    mentions: BTreeMap<Span, EntityMention>,
}

impl Article {
    /// Create an article without hyperlinks or mentions.
    #[must_use]
    pub fn new(id: u64, title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let char_len = text.chars().count();
        Self {
            id,
            title: title.into(),
            text,
            char_len,
            hyperlinks: Vec::new(),
            title_synonyms: Vec::new(),
            mentions: BTreeMap::new(),
        }
    }

    /// Builder: attach hyperlinks.
    #[must_use]
    pub fn with_hyperlinks(mut self, hyperlinks: Vec<Hyperlink>) -> Self {
        self.hyperlinks = hyperlinks;
        self
    }

    /// Builder: attach bold title spans.
    #[must_use]
    pub fn with_title_synonyms(mut self, spans: Vec<Span>) -> Self {
        self.title_synonyms = spans;
        self
    }

    /// The article text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text length in characters.
    #[must_use]
    pub const fn char_len(&self) -> usize {
        self.char_len
    }

    /// Mentions in span order.
    pub fn mentions(&self) -> impl Iterator<Item = &EntityMention> {
        self.mentions.values()
    }

    /// Number of mentions.
    #[must_use]
    pub fn mention_count(&self) -> usize {
        self.mentions.len()
    }

    /// Mention with exactly this span.
    #[must_use]
    pub fn mention(&self, span: &Span) -> Option<&EntityMention> {
        self.mentions.get(span)
    }

    /// Whether a linked mention exists with exactly this span.
    #[must_use]
    pub fn is_linked_span(&self, span: &Span) -> bool {
        self.mentions.get(span).is_some_and(EntityMention::is_linked)
    }

    /// Whether `span` overlaps any mention that is not flagged `contained`.
    #[must_use]
    pub fn overlaps_mention(&self, span: &Span) -> bool {
        self.last_outer_before(span.end)
            .is_some_and(|m| m.span().overlaps(span))
    }

    /// The non-`contained` mention with the greatest start below `end`.
    ///
    /// Non-`contained` mentions are pairwise disjoint, so this is the only
    /// one that can overlap or contain a span ending at `end`.
    fn last_outer_before(&self, end: usize) -> Option<&EntityMention> {
        let bound = Span { start: end, end: 0 };
        self.mentions
            .range(..bound)
            .rev()
            .map(|(_, m)| m)
            .find(|m| !m.is_contained())
    }

    /// Add a mention unless it conflicts with an existing one.
    ///
    /// A `contained` mention needs a free exact span inside an existing
    /// non-`contained` mention; any other mention must not overlap an
    /// existing non-`contained` mention. Returns whether the mention was
    /// added.
    pub fn add_mention(&mut self, mention: EntityMention) -> bool {
        let span = mention.span();
        if span.end > self.char_len || self.mentions.contains_key(&span) {
            return false;
        }
        let outer = self.last_outer_before(span.end);
        let accepted = if mention.is_contained() {
            outer.is_some_and(|m| m.span().contains(&span))
        } else {
            !outer.is_some_and(|m| m.span().overlaps(&span))
        };
        if accepted {
            self.mentions.insert(span, mention);
        }
        accepted
    }

    /// Add several mentions; returns how many were accepted.
    pub fn add_mentions<I>(&mut self, mentions: I) -> usize
    where
        I: IntoIterator<Item = EntityMention>,
    {
        let char_len = self.char_len;
        mentions
            .into_iter()
            .filter(|m| m.span().end <= char_len)
            .fold(0, |added, m| added + usize::from(self.add_mention(m)))
    }

    /// Link an existing, still-unlinked mention.
    ///
    /// Returns `Ok(false)` if there is no mention with this span or if it is
    /// already linked.
    pub fn link_unlinked(
        &mut self,
        span: &Span,
        entity_id: impl Into<String>,
        linked_by: impl Into<String>,
    ) -> Result<bool> {
        match self.mentions.get_mut(span) {
            Some(mention) if !mention.is_linked() => {
                mention.set_link(entity_id, linked_by)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Text covered by a span (character offsets).
    #[must_use]
    pub fn snippet(&self, span: &Span) -> String {
        self.text
            .chars()
            .skip(span.start)
            .take(span.len())
            .collect()
    }

    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from a JSON line.
    pub fn from_json(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Wire form of [`Article`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArticleRecord {
    id: u64,
    #[serde(default)]
    title: String,
    text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    hyperlinks: Vec<Hyperlink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    title_synonyms: Vec<Span>,
    #[serde(default)]
    entity_mentions: Vec<EntityMention>,
}

impl TryFrom<ArticleRecord> for Article {
    type Error = Error;

    fn try_from(record: ArticleRecord) -> Result<Self> {
        let mut article = Article::new(record.id, record.title, record.text)
            .with_hyperlinks(record.hyperlinks)
            .with_title_synonyms(record.title_synonyms);
        let len = article.char_len;
        let out_of_range = article
            .hyperlinks
            .iter()
            .map(|h| h.span)
            .chain(article.title_synonyms.iter().copied())
            .chain(record.entity_mentions.iter().map(EntityMention::span))
            .find(|span| span.end > len);
        if let Some(span) = out_of_range {
            return Err(Error::parse(format!(
                "article {}: span {} exceeds text length {}",
                article.id, span, len
            )));
        }
        // Persisted mention sets are taken as-is; only exact duplicates are invalid.
        for mention in record.entity_mentions {
            let span = mention.span();
            if article.mentions.insert(span, mention).is_some() {
                return Err(Error::parse(format!(
                    "article {}: duplicate mention span {}",
                    article.id, span
                )));
            }
        }
        Ok(article)
    }
}

impl From<Article> for ArticleRecord {
    fn from(article: Article) -> Self {
        ArticleRecord {
            id: article.id,
            title: article.title,
            text: article.text,
            hyperlinks: article.hyperlinks,
            title_synonyms: article.title_synonyms,
            entity_mentions: article.mentions.into_values().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> Span {
        Span::new(start, end).unwrap()
    }

    #[test]
    fn test_first_writer_wins() {
        let mut article = Article::new(1, "", "New York City is big");
        assert!(article.add_mention(EntityMention::new(span(0, 13), "A").linked("Q60", "A")));
        assert!(!article.add_mention(EntityMention::new(span(0, 8), "B").linked("Q1384", "B")));
        assert!(!article.add_mention(EntityMention::new(span(4, 20), "B")));
        assert_eq!(article.mention_count(), 1);
        assert_eq!(article.mention(&span(0, 13)).unwrap().entity_id(), Some("Q60"));
    }

    #[test]
    fn test_contained_mentions_may_nest() {
        let mut article = Article::new(1, "", "New York City is big");
        assert!(article.add_mention(EntityMention::new(span(0, 13), "A")));
        assert!(article.add_mention(EntityMention::new(span(0, 8), "A").contained()));
        assert_eq!(article.mention_count(), 2);
        // Non-contained proposals still conflict with the container.
        assert!(!article.add_mention(EntityMention::new(span(9, 13), "B")));
    }

    #[test]
    fn test_contained_mentions_need_a_container() {
        let mut article = Article::new(1, "", "New York City and Paris");
        assert!(!article.add_mention(EntityMention::new(span(0, 8), "A").contained()));
        assert!(article.add_mention(EntityMention::new(span(0, 13), "A")));
        // Straddles the container's end.
        assert!(!article.add_mention(EntityMention::new(span(9, 17), "A").contained()));
        assert!(!article.add_mention(EntityMention::new(span(18, 23), "A").contained()));
        assert!(article.add_mention(EntityMention::new(span(4, 13), "A").contained()));
        assert!(article.add_mention(EntityMention::new(span(4, 8), "A").contained()));
        assert_eq!(article.mention_count(), 3);
    }

    #[test]
    fn test_overlap_skips_nested_mentions() {
        let mut article = Article::new(1, "", "aa bb cc dd ee ff");
        for start in [0, 6, 12] {
            assert!(article.add_mention(EntityMention::new(span(start, start + 2), "A")));
        }
        assert!(article.add_mention(EntityMention::new(span(7, 8), "A").contained()));
        // The nested mention sorts after its container and must not hide it.
        assert!(!article.add_mention(EntityMention::new(span(7, 10), "B")));
        assert!(!article.add_mention(EntityMention::new(span(1, 7), "B")));
        assert!(article.add_mention(EntityMention::new(span(3, 5), "B")));
        assert!(article.add_mention(EntityMention::new(span(8, 12), "B")));
        assert_eq!(article.mention_count(), 6);
    }

    #[test]
    fn test_link_unlinked_never_relinks() {
        let mut article = Article::new(1, "", "Mary left.");
        article.add_mention(EntityMention::new(span(0, 4), "NER"));
        assert!(article.link_unlinked(&span(0, 4), "Q1", "COREF").unwrap());
        assert!(!article.link_unlinked(&span(0, 4), "Q2", "COREF").unwrap());
        assert_eq!(article.mention(&span(0, 4)).unwrap().entity_id(), Some("Q1"));
        assert!(!article.link_unlinked(&span(5, 9), "Q2", "COREF").unwrap());
    }

    #[test]
    fn test_rejects_mentions_past_end_of_text() {
        let mut article = Article::new(1, "", "short");
        assert!(!article.add_mention(EntityMention::new(span(3, 9), "A")));
    }

    #[test]
    fn test_snippet_uses_char_offsets() {
        let article = Article::new(1, "", "Café Müller opened");
        assert_eq!(article.snippet(&span(5, 11)), "Müller");
        assert_eq!(article.char_len(), 18);
    }

    #[test]
    fn test_record_round_trip() {
        let mut article = Article::new(3, "Ada Lovelace", "Ada Lovelace wrote notes.")
            .with_hyperlinks(vec![Hyperlink::new(span(0, 12), "Ada Lovelace")]);
        article.add_mention(
            EntityMention::new(span(0, 12), "HRL")
                .linked("Q7259", "HRL")
                .with_candidates(["Q7259"]),
        );
        let line = article.to_json().unwrap();
        assert!(line.contains(r#""hyperlinks":[[[0,12],"Ada Lovelace"]]"#));
        let back = Article::from_json(&line).unwrap();
        assert_eq!(back, article);
    }

    #[test]
    fn test_parse_rejects_out_of_range_spans() {
        let line = r#"{"id":1,"title":"","text":"abc","hyperlinks":[[[0,9],"X"]]}"#;
        assert!(Article::from_json(line).is_err());
    }
}
