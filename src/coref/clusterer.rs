//! Gender- and role-driven pronoun clustering.
//!
//! Named mentions are visited in text order. Before a named mention is
//! recorded, every pending pronoun that starts before it is resolved against
//! the entities already seen with the same gender class:
//!
//! 1. an expletive "it" ("It is raining") is skipped;
//! 2. candidates are scanned from the most recent backwards, stopping at the
//!    first one ending more than `window_chars` characters before the pronoun;
//! 3. the most recent candidate whose tokens carry a subject relation wins,
//!    otherwise the most recent candidate.
//!
//! A resolved pronoun becomes a candidate itself, so chains like
//! "Mary ... she ... her" stay with Mary. Pronouns after the last named
//! mention are resolved the same way once the named mentions run out.

use super::pronouns::Pronoun;
use crate::annotate::Annotation;
use kblink_core::{Gender, Span};
use std::collections::BTreeMap;

/// Dependency relations that mark a grammatical subject.
const SUBJECT_DEPS: &[&str] = &["nsubj", "nsubjpass"];

/// Entity id → spans referring to it, earliest established reference first.
pub type Clusters = BTreeMap<String, Vec<Span>>;

/// A linked mention that pronouns can refer back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedMention {
    /// Character span.
    pub span: Span,
    /// Linked entity.
    pub entity_id: String,
    /// Gender class of the entity.
    pub gender: Gender,
}

#[derive(Debug, Clone)]
struct Referenced {
    span: Span,
    entity_id: String,
    deps: Vec<String>,
}

impl Referenced {
    fn is_subject(&self) -> bool {
        self.deps.iter().any(|d| SUBJECT_DEPS.contains(&d.as_str()))
    }
}

/// Builds coreference clusters for one article.
#[derive(Debug, Clone, Copy)]
pub struct CorefClusterer {
    window_chars: usize,
}

impl Default for CorefClusterer {
    fn default() -> Self {
        Self { window_chars: 200 }
    }
}

struct ClusterState<'a> {
    annotation: &'a Annotation,
    referenced: [Vec<Referenced>; Gender::COUNT],
    clusters: Clusters,
}

impl ClusterState<'_> {
    fn record(&mut self, span: Span, entity_id: &str, gender: Gender) {
        self.referenced[gender.index()].push(Referenced {
            span,
            entity_id: entity_id.to_string(),
            deps: self.annotation.deps_in(&span),
        });
        self.clusters
            .entry(entity_id.to_string())
            .or_default()
            .push(span);
    }
}

impl CorefClusterer {
    /// Clusterer with a custom look-back window (in characters).
    #[must_use]
    pub fn new(window_chars: usize) -> Self {
        Self { window_chars }
    }

    /// Cluster `named` mentions and `pronouns`.
    ///
    /// Both inputs may be in any order; they are processed by span start.
    #[must_use]
    pub fn cluster(&self, named: &[NamedMention], pronouns: &[Pronoun], annotation: &Annotation) -> Clusters {
        let mut named: Vec<&NamedMention> = named.iter().collect();
        named.sort_by_key(|m| m.span);
        let mut pronouns: Vec<&Pronoun> = pronouns.iter().collect();
        pronouns.sort_by_key(|p| p.span);

        let mut state = ClusterState {
            annotation,
            referenced: Default::default(),
            clusters: Clusters::new(),
        };
        let mut pending = pronouns.into_iter().peekable();
        for mention in named {
            while let Some(pronoun) = pending.next_if(|p| p.span.start < mention.span.start) {
                self.resolve(pronoun, &mut state);
            }
            state.record(mention.span, &mention.entity_id, mention.gender);
        }
        for pronoun in pending {
            self.resolve(pronoun, &mut state);
        }
        state.clusters
    }

    fn resolve(&self, pronoun: &Pronoun, state: &mut ClusterState<'_>) {
        if pronoun.is_it() && state.annotation.is_expletive(pronoun.span.start) {
            return;
        }
        let window: Vec<&Referenced> = state.referenced[pronoun.gender.index()]
            .iter()
            .rev()
            .take_while(|r| pronoun.span.start.saturating_sub(r.span.end) <= self.window_chars)
            .collect();
        let chosen = window
            .iter()
            .find(|r| r.is_subject())
            .or_else(|| window.first())
            .map(|r| r.entity_id.clone());
        if let Some(entity_id) = chosen {
            state.record(pronoun.span, &entity_id, pronoun.gender);
        }
    }
}
