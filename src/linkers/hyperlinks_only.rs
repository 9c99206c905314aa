//! Link exactly the hyperlink anchors whose targets resolve.

use super::{EntityLinker, StageOutcome};
use crate::annotate::Annotation;
use crate::error::Result;
use crate::kb::EntityDatabase;
use kblink_core::{Article, EntityMention};
use std::sync::Arc;

/// Stage identifier, used for both detection and linking.
pub const IDENTIFIER: &str = "Hyperlinks Only";

/// Hyperlink stage without propagation.
#[derive(Debug)]
pub struct HyperlinksOnlyLinker {
    db: Arc<EntityDatabase>,
}

impl HyperlinksOnlyLinker {
    /// Create the stage.
    #[must_use]
    pub fn new(db: Arc<EntityDatabase>) -> Self {
        Self { db }
    }
}

impl EntityLinker for HyperlinksOnlyLinker {
    fn name(&self) -> &'static str {
        IDENTIFIER
    }

    fn link_entities(&self, article: &mut Article, _annotation: &Annotation) -> Result<StageOutcome> {
        let mut outcome = StageOutcome::default();
        let mut mentions = Vec::with_capacity(article.hyperlinks.len());
        for link in &article.hyperlinks {
            match self.db.link2id(&link.target) {
                Some(entity_id) => mentions.push(
                    EntityMention::new(link.span, IDENTIFIER)
                        .linked(entity_id.clone(), IDENTIFIER)
                        .with_candidates([entity_id]),
                ),
                None => outcome.unresolved += 1,
            }
        }
        outcome.added = article.add_mentions(mentions);
        Ok(outcome)
    }
}
