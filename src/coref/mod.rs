//! Coreference over knowledge-base genders.
//!
//! [`KbCorefLinker`] is the optional last pipeline stage. It clusters the
//! article's linked mentions with the pronouns found in the annotation and
//! writes each cluster's entity back onto the pronoun spans.

mod clusterer;
pub mod pronouns;

pub use clusterer::{Clusters, CorefClusterer, NamedMention};
pub use pronouns::{detect_pronouns, is_pronoun, pronoun_gender, Pronoun};

use crate::annotate::Annotation;
use crate::config::LinkerConfig;
use crate::error::Result;
use crate::kb::EntityDatabase;
use crate::linkers::{EntityLinker, StageOutcome};
use kblink_core::{Article, EntityMention};
use std::sync::Arc;

/// Stage identifier, used for both detection and linking.
pub const IDENTIFIER: &str = "KB Coref";

/// Pronoun resolution stage backed by the gender table.
#[derive(Debug)]
pub struct KbCorefLinker {
    db: Arc<EntityDatabase>,
    clusterer: CorefClusterer,
}

impl KbCorefLinker {
    /// Create the stage.
    #[must_use]
    pub fn new(db: Arc<EntityDatabase>, config: &LinkerConfig) -> Self {
        Self {
            db,
            clusterer: CorefClusterer::new(config.coref_window_chars),
        }
    }

    /// Clusters for an article without modifying it.
    #[must_use]
    pub fn clusters(&self, article: &Article, annotation: &Annotation) -> Clusters {
        let named: Vec<NamedMention> = article
            .mentions()
            .filter(|m| m.is_resolved())
            .filter_map(|m| {
                let entity_id = m.entity_id()?;
                Some(NamedMention {
                    span: m.span(),
                    entity_id: entity_id.to_string(),
                    gender: self.db.get_gender(entity_id),
                })
            })
            .collect();
        // Pronouns already claimed by a mention are not re-resolved.
        let pronouns: Vec<Pronoun> = detect_pronouns(annotation)
            .into_iter()
            .filter(|p| {
                article
                    .mention(&p.span)
                    .map_or(!article.overlaps_mention(&p.span), |m| !m.is_linked())
            })
            .collect();
        self.clusterer.cluster(&named, &pronouns, annotation)
    }
}

impl EntityLinker for KbCorefLinker {
    fn name(&self) -> &'static str {
        IDENTIFIER
    }

    fn link_entities(&self, article: &mut Article, annotation: &Annotation) -> Result<StageOutcome> {
        let clusters = self.clusters(article, annotation);
        let mut added = 0;
        for (entity_id, spans) in &clusters {
            let Some((first, rest)) = spans.split_first() else {
                continue;
            };
            for span in rest {
                if article.mention(span).is_some() {
                    if article.link_unlinked(span, entity_id.as_str(), IDENTIFIER)? {
                        added += 1;
                    }
                    continue;
                }
                let mention = EntityMention::new(*span, IDENTIFIER)
                    .linked(entity_id.as_str(), IDENTIFIER)
                    .with_candidates([entity_id.as_str()])
                    .with_referenced_span(*first);
                added += usize::from(article.add_mention(mention));
            }
        }
        log::debug!(
            "Article {}: {} coreference clusters, {} pronouns linked",
            article.id,
            clusters.len(),
            added
        );
        Ok(StageOutcome { added, unresolved: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::tests::token;
    use crate::kb::InMemorySource;
    use crate::linkers::CorefLinkerKind;
    use kblink_core::Span;

    fn linker() -> KbCorefLinker {
        let source = InMemorySource::new().gender("Q1", "female");
        let db = EntityDatabase::new(source);
        db.ensure_all(CorefLinkerKind::KbCoref.required_mappings())
            .unwrap();
        KbCorefLinker::new(Arc::new(db), &LinkerConfig::default())
    }

    fn span(start: usize, end: usize) -> Span {
        Span::new(start, end).unwrap()
    }

    #[test]
    fn test_back_propagates_to_pronouns() {
        let mut article = Article::new(1, "", "Mary left. She smiled.");
        article.add_mention(EntityMention::new(span(0, 4), "test").linked("Q1", "test"));
        let annotation = Annotation {
            tokens: vec![
                token(0, "Mary", "NNP", "nsubj"),
                token(5, "left", "VBD", "ROOT"),
                token(11, "She", "PRP", "nsubj"),
                token(15, "smiled", "VBD", "ROOT"),
            ],
            ..Annotation::default()
        };
        let outcome = linker().link_entities(&mut article, &annotation).unwrap();
        assert_eq!(outcome.added, 1);

        let she = article.mention(&span(11, 14)).unwrap();
        assert_eq!(she.entity_id(), Some("Q1"));
        assert_eq!(she.linked_by(), Some(IDENTIFIER));
        assert_eq!(she.recognized_by, IDENTIFIER);
        assert_eq!(she.referenced_span, Some(span(0, 4)));
        assert!(she.candidates.contains("Q1"));
    }

    #[test]
    fn test_expletive_it_is_left_alone() {
        let mut article = Article::new(2, "", "Paris is nice. It is raining.");
        article.add_mention(EntityMention::new(span(0, 5), "test").linked("Q90", "test"));
        let annotation = Annotation {
            tokens: vec![
                token(0, "Paris", "NNP", "nsubj"),
                token(6, "is", "VBZ", "ROOT"),
                token(9, "nice", "JJ", "acomp"),
                token(15, "It", "PRP", "expl"),
                token(18, "is", "VBZ", "aux"),
                token(21, "raining", "VBG", "ROOT"),
            ],
            ..Annotation::default()
        };
        let outcome = linker().link_entities(&mut article, &annotation).unwrap();
        assert_eq!(outcome.added, 0);
        assert!(article.mention(&span(15, 17)).is_none());
    }

    #[test]
    fn test_links_existing_unlinked_pronoun_mention() {
        let mut article = Article::new(3, "", "Mary left. She smiled.");
        article.add_mention(EntityMention::new(span(0, 4), "test").linked("Q1", "test"));
        article.add_mention(EntityMention::new(span(11, 14), "ner"));
        let annotation = Annotation {
            tokens: vec![token(0, "Mary", "NNP", "nsubj"), token(11, "She", "PRP", "nsubj")],
            ..Annotation::default()
        };
        let outcome = linker().link_entities(&mut article, &annotation).unwrap();
        assert_eq!(outcome.added, 1);
        let she = article.mention(&span(11, 14)).unwrap();
        assert_eq!(she.entity_id(), Some("Q1"));
        assert_eq!(she.recognized_by, "ner");
    }
}
