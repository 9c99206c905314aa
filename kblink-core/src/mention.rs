//! Entity mentions: spans proposed or confirmed to reference a KB entity.

use crate::error::{Error, Result};
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sentinel entity id for strings that have no knowledge-base mapping.
pub const UNKNOWN_ENTITY: &str = "Unknown";

/// A resolved entity id together with the stage that resolved it.
///
/// Keeping both in one value makes "id set iff linked_by set" hold by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    /// Knowledge-base entity id (e.g. `Q42`), or [`UNKNOWN_ENTITY`].
    pub entity_id: String,
    /// Identifier of the stage that resolved the id.
    pub linked_by: String,
}

impl Link {
    /// Create a link.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, linked_by: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            linked_by: linked_by.into(),
        }
    }

    /// Whether this link points at the "unknown" sentinel.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.entity_id == UNKNOWN_ENTITY
    }
}

/// A mention of an entity in an article.
///
/// The span is fixed at construction. The link may be set exactly once,
/// by the stage that created the mention or by coreference back-propagation
/// onto an unlinked mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MentionRecord", into = "MentionRecord")]
pub struct EntityMention {
    span: Span,
    /// Identifier of the stage that detected the mention.
    pub recognized_by: String,
    link: Option<Link>,
    /// Candidate entity ids considered for this mention (may be empty).
    pub candidates: BTreeSet<String>,
    /// Span of the antecedent mention, for coreference mentions.
    pub referenced_span: Option<Span>,
    /// Marks deliberate nesting inside a larger mention.
    pub contained: Option<bool>,
}

impl EntityMention {
    /// Create an unlinked mention.
    #[must_use]
    pub fn new(span: Span, recognized_by: impl Into<String>) -> Self {
        Self {
            span,
            recognized_by: recognized_by.into(),
            link: None,
            candidates: BTreeSet::new(),
            referenced_span: None,
            contained: None,
        }
    }

    /// Builder: attach a link.
    #[must_use]
    pub fn linked(mut self, entity_id: impl Into<String>, linked_by: impl Into<String>) -> Self {
        self.link = Some(Link::new(entity_id, linked_by));
        self
    }

    /// Builder: set the candidate set.
    #[must_use]
    pub fn with_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the antecedent span.
    #[must_use]
    pub fn with_referenced_span(mut self, span: Span) -> Self {
        self.referenced_span = Some(span);
        self
    }

    /// Builder: mark as intentionally nested inside a container mention.
    #[must_use]
    pub fn contained(mut self) -> Self {
        self.contained = Some(true);
        self
    }

    /// The mention span.
    #[must_use]
    pub const fn span(&self) -> Span {
        self.span
    }

    /// The link, if resolved.
    #[must_use]
    pub fn link(&self) -> Option<&Link> {
        self.link.as_ref()
    }

    /// Resolved entity id, if any.
    #[must_use]
    pub fn entity_id(&self) -> Option<&str> {
        self.link.as_ref().map(|l| l.entity_id.as_str())
    }

    /// Stage that resolved the entity id, if any.
    #[must_use]
    pub fn linked_by(&self) -> Option<&str> {
        self.link.as_ref().map(|l| l.linked_by.as_str())
    }

    /// Whether an entity id has been set.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// Whether the mention is linked to a real entity (not the sentinel).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.link.as_ref().is_some_and(|l| !l.is_unknown())
    }

    /// Whether the mention is flagged as deliberately nested.
    #[must_use]
    pub fn is_contained(&self) -> bool {
        self.contained == Some(true)
    }

    /// Set the link of a still-unlinked mention.
    ///
    /// Fails if the mention is already linked: links are never overwritten.
    pub fn set_link(
        &mut self,
        entity_id: impl Into<String>,
        linked_by: impl Into<String>,
    ) -> Result<()> {
        if let Some(existing) = &self.link {
            return Err(Error::invalid_input(format!(
                "mention {} already linked to {} by {}",
                self.span, existing.entity_id, existing.linked_by
            )));
        }
        self.link = Some(Link::new(entity_id, linked_by));
        Ok(())
    }
}

/// Wire form of [`EntityMention`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MentionRecord {
    span: Span,
    recognized_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    linked_by: Option<String>,
    #[serde(default)]
    candidates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    referenced_span: Option<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contained: Option<bool>,
}

impl TryFrom<MentionRecord> for EntityMention {
    type Error = Error;

    fn try_from(record: MentionRecord) -> Result<Self> {
        let link = match (record.id, record.linked_by) {
            (Some(entity_id), Some(linked_by)) => Some(Link {
                entity_id,
                linked_by,
            }),
            (None, None) => None,
            (Some(id), None) => {
                return Err(Error::parse(format!(
                    "mention {} has id {} but no linked_by",
                    record.span, id
                )))
            }
            (None, Some(by)) => {
                return Err(Error::parse(format!(
                    "mention {} has linked_by {} but no id",
                    record.span, by
                )))
            }
        };
        Ok(EntityMention {
            span: record.span,
            recognized_by: record.recognized_by,
            link,
            candidates: record.candidates.into_iter().collect(),
            referenced_span: record.referenced_span,
            contained: record.contained,
        })
    }
}

impl From<EntityMention> for MentionRecord {
    fn from(mention: EntityMention) -> Self {
        let (id, linked_by) = match mention.link {
            Some(link) => (Some(link.entity_id), Some(link.linked_by)),
            None => (None, None),
        };
        MentionRecord {
            span: mention.span,
            recognized_by: mention.recognized_by,
            id,
            linked_by,
            candidates: mention.candidates.into_iter().collect(),
            referenced_span: mention.referenced_span,
            contained: mention.contained,
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
    fn test_link_is_set_once() {
        let mut mention = EntityMention::new(span(0, 4), "NER");
        assert!(!mention.is_linked());
        mention.set_link("Q1", "LINKER").unwrap();
        assert_eq!(mention.entity_id(), Some("Q1"));
        assert_eq!(mention.linked_by(), Some("LINKER"));
        assert!(mention.set_link("Q2", "OTHER").is_err());
        assert_eq!(mention.entity_id(), Some("Q1"));
    }

    #[test]
    fn test_unknown_is_linked_but_unresolved() {
        let mention = EntityMention::new(span(0, 4), "NER").linked(UNKNOWN_ENTITY, "NER");
        assert!(mention.is_linked());
        assert!(!mention.is_resolved());
    }

    #[test]
    fn test_wire_format_field_presence() {
        let unlinked = EntityMention::new(span(2, 6), "Greedy Alias Matcher");
        let json = serde_json::to_value(&unlinked).unwrap();
        assert_eq!(json["span"], serde_json::json!([2, 6]));
        assert!(json.get("id").is_none());
        assert!(json.get("linked_by").is_none());
        assert_eq!(json["candidates"], serde_json::json!([]));
        assert!(json.get("referenced_span").is_none());
        assert!(json.get("contained").is_none());

        let linked = EntityMention::new(span(10, 12), "KB Coref")
            .linked("Q7", "KB Coref")
            .with_candidates(["Q7"])
            .with_referenced_span(span(0, 4));
        let json = serde_json::to_value(&linked).unwrap();
        assert_eq!(json["id"], "Q7");
        assert_eq!(json["linked_by"], "KB Coref");
        assert_eq!(json["referenced_span"], serde_json::json!([0, 4]));
    }

    #[test]
    fn test_rejects_half_linked_record() {
        let bad = r#"{"span":[0,3],"recognized_by":"X","id":"Q1"}"#;
        assert!(serde_json::from_str::<EntityMention>(bad).is_err());
        let bad = r#"{"span":[0,3],"recognized_by":"X","linked_by":"Y"}"#;
        assert!(serde_json::from_str::<EntityMention>(bad).is_err());
    }

    #[test]
    fn test_missing_candidates_parse_as_empty() {
        let json = r#"{"span":[0,3],"recognized_by":"X"}"#;
        let mention: EntityMention = serde_json::from_str(json).unwrap();
        assert!(mention.candidates.is_empty());
    }
}
