//! Primary stage over an external recognizer's NER spans.
//!
//! The annotator supplies the spans (and, when a trained ranking model ran,
//! the entity it chose). Spans with an ignored label, dates and, in
//! uppercase-only mode, all-lowercase spans are dropped. Spans without any
//! knowledge-base candidate are dropped and counted as unresolved. Without a
//! model decision the anchor-frequency prior picks the entity.

use super::alias_matcher::{is_all_lowercase, is_date};
use super::{best_candidate, EntityLinker, StageOutcome};
use crate::annotate::Annotation;
use crate::config::LinkerConfig;
use crate::error::Result;
use crate::kb::EntityDatabase;
use crate::offset::CharText;
use kblink_core::{Article, EntityMention};
use std::sync::Arc;

/// Stage identifier for detection.
pub const RECOGNIZER: &str = "External NER";
/// Stage identifier for disambiguation.
pub const LINKER: &str = "Trained Entity Linker";

/// Links annotator NER spans.
#[derive(Debug)]
pub struct TrainedModelLinker {
    db: Arc<EntityDatabase>,
    config: LinkerConfig,
}

impl TrainedModelLinker {
    /// Create the stage.
    #[must_use]
    pub fn new(db: Arc<EntityDatabase>, config: &LinkerConfig) -> Self {
        Self {
            db,
            config: config.clone(),
        }
    }
}

impl EntityLinker for TrainedModelLinker {
    fn name(&self) -> &'static str {
        LINKER
    }

    fn link_entities(&self, article: &mut Article, annotation: &Annotation) -> Result<StageOutcome> {
        let text = CharText::new(article.text());
        let mut mentions = Vec::new();
        let mut unresolved = 0;
        for ner in &annotation.entities {
            if self.config.ignores_label(&ner.label) {
                continue;
            }
            let snippet = text.span_text(&ner.span);
            if is_date(snippet) || (self.config.uppercase_only && is_all_lowercase(snippet)) {
                continue;
            }
            let candidates = self.db.get_candidates(snippet);
            if candidates.is_empty() {
                log::debug!("Article {}: no candidates for {:?}", article.id, snippet);
                unresolved += 1;
                continue;
            }
            let chosen = ner
                .entity_id
                .clone()
                .or_else(|| best_candidate(&self.db, snippet, &candidates));
            let Some(entity_id) = chosen else {
                continue;
            };
            mentions.push(
                EntityMention::new(ner.span, RECOGNIZER)
                    .linked(entity_id, LINKER)
                    .with_candidates(candidates),
            );
        }
        let added = article.add_mentions(mentions);
        log::debug!("Article {}: {} NER mentions linked", article.id, added);
        Ok(StageOutcome { added, unresolved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::NerSpan;
    use crate::kb::InMemorySource;
    use crate::linkers::LinkerKind;
    use kblink_core::Span;

    fn ner(start: usize, end: usize, label: &str, id: Option<&str>) -> NerSpan {
        NerSpan {
            span: Span::new(start, end).unwrap(),
            label: label.to_string(),
            entity_id: id.map(str::to_string),
        }
    }

    #[test]
    fn test_links_ner_spans() {
        let source = InMemorySource::new()
            .entity("Q90", "Paris", 300)
            .entity("Q167646", "Paris", 40)
            .alias("Paris", "Q90")
            .alias("Paris", "Q167646")
            .alias("Helen", "Q167646")
            .alias("100 euros", "Q4916");
        let db = EntityDatabase::new(source);
        db.ensure_all(LinkerKind::TrainedModel.required_mappings())
            .unwrap();
        let linker = TrainedModelLinker::new(Arc::new(db), &LinkerConfig::default());

        let mut article = Article::new(1, "", "Paris met Helen for 100 euros in Rome.");
        let annotation = Annotation {
            entities: vec![
                ner(0, 5, "PERSON", Some("Q167646")),
                ner(10, 15, "PERSON", None),
                ner(20, 29, "MONEY", None),
                ner(33, 37, "GPE", None),
            ],
            ..Annotation::default()
        };
        let outcome = linker.link_entities(&mut article, &annotation).unwrap();
        // "Rome" has no candidate; "100 euros" is an ignored label.
        assert_eq!(outcome, StageOutcome { added: 2, unresolved: 1 });

        let paris = article.mention(&Span::new(0, 5).unwrap()).unwrap();
        assert_eq!(paris.entity_id(), Some("Q167646"));
        assert_eq!(paris.candidates.len(), 2);
        let helen = article.mention(&Span::new(10, 15).unwrap()).unwrap();
        assert_eq!(helen.entity_id(), Some("Q167646"));
        assert_eq!(article.mention_count(), 2);
    }

    #[test]
    fn test_uppercase_only_skips_lowercase_spans() {
        let db = EntityDatabase::new(
            InMemorySource::new()
                .entity("Q90", "Paris", 300)
                .alias("paris", "Q90"),
        );
        db.ensure_all(LinkerKind::TrainedModel.required_mappings())
            .unwrap();
        let db = Arc::new(db);
        let annotation = Annotation {
            entities: vec![ner(0, 5, "GPE", None)],
            ..Annotation::default()
        };

        let linker = TrainedModelLinker::new(Arc::clone(&db), &LinkerConfig::default());
        let mut article = Article::new(1, "", "paris in spring");
        let outcome = linker.link_entities(&mut article, &annotation).unwrap();
        assert_eq!(outcome.added, 1);
        assert_eq!(
            article.mention(&Span::new(0, 5).unwrap()).unwrap().entity_id(),
            Some("Q90")
        );

        let config = LinkerConfig {
            uppercase_only: true,
            ..LinkerConfig::default()
        };
        let linker = TrainedModelLinker::new(db, &config);
        let mut article = Article::new(1, "", "paris in spring");
        let outcome = linker.link_entities(&mut article, &annotation).unwrap();
        assert_eq!(outcome, StageOutcome::default());
        assert_eq!(article.mention_count(), 0);
    }
}
