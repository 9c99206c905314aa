//! Linker stages and the registry that builds them.
//!
//! Every stage implements [`EntityLinker`]: it receives the article and its
//! annotation and appends mentions for spans no earlier stage has claimed.
//! Stages are chosen by kind, one enum per pipeline slot:
//!
//! | Slot | Kinds |
//! |------|-------|
//! | hyperlink (optional) | [`HyperlinkLinkerKind::HyperlinkReference`], [`HyperlinkLinkerKind::HyperlinksOnly`] |
//! | primary (exactly one) | [`LinkerKind::AliasMatcher`], [`LinkerKind::TrainedModel`], [`LinkerKind::PredictionReplay`] |
//! | coreference (optional) | [`CorefLinkerKind::KbCoref`] |
//!
//! Each kind declares the knowledge-base mappings it needs; the orchestrator
//! loads them before the kind's `build` runs.

pub mod alias_matcher;
pub mod hyperlink;
pub mod hyperlinks_only;
pub mod prediction;
pub mod trained;

pub use alias_matcher::{AliasMatcherLinker, AliasTable};
pub use hyperlink::HyperlinkReferenceLinker;
pub use hyperlinks_only::HyperlinksOnlyLinker;
pub use prediction::PredictionReplayLinker;
pub use trained::TrainedModelLinker;

use crate::annotate::Annotation;
use crate::config::LinkerConfig;
use crate::coref::KbCorefLinker;
use crate::error::{Error, Result};
use crate::kb::{EntityDatabase, MappingName};
use kblink_core::Article;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

// =============================================================================
// Stage trait
// =============================================================================

/// What a stage did to one article.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageOutcome {
    /// Mentions added (or unlinked mentions newly linked).
    pub added: usize,
    /// Titles or aliases without a knowledge-base mapping.
    pub unresolved: usize,
}

impl std::ops::AddAssign for StageOutcome {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.unresolved += other.unresolved;
    }
}

/// A detection/disambiguation stage.
///
/// Stages only append: they never remove a mention or change the link of a
/// span an earlier stage already linked.
pub trait EntityLinker: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &'static str;

    /// Add mentions to `article`.
    fn link_entities(&self, article: &mut Article, annotation: &Annotation) -> Result<StageOutcome>;
}

/// Everything a stage may need at construction time.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Shared knowledge base, with the kind's mappings already loaded.
    pub db: Arc<EntityDatabase>,
    /// Run configuration.
    pub config: LinkerConfig,
    /// Prediction file for [`LinkerKind::PredictionReplay`].
    pub predictions: Option<PathBuf>,
}

/// Pick the most plausible entity among candidates for an alias.
///
/// Highest anchor frequency of `alias` wins; ties go to the more popular
/// entity, then to the smaller id.
#[must_use]
pub fn best_candidate(db: &EntityDatabase, alias: &str, candidates: &BTreeSet<String>) -> Option<String> {
    candidates
        .iter()
        .max_by(|a, b| {
            let key_a = (db.get_link_frequency(alias, a), db.get_popularity(a));
            let key_b = (db.get_link_frequency(alias, b), db.get_popularity(b));
            key_a.cmp(&key_b).then_with(|| b.cmp(a))
        })
        .cloned()
}

// =============================================================================
// Registry
// =============================================================================

macro_rules! stage_kind {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $tag:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every kind of this slot.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Registry tag.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $tag ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|kind| kind.as_str() == s)
                    .ok_or_else(|| {
                        let known: Vec<&str> = $name::ALL.iter().map(|k| k.as_str()).collect();
                        Error::config(format!(
                            "unknown {} {:?} (expected one of: {})",
                            stringify!($name),
                            s,
                            known.join(", ")
                        ))
                    })
            }
        }
    };
}

stage_kind! {
    /// Kinds for the optional hyperlink stage.
    HyperlinkLinkerKind {
        /// Hyperlink seeding plus propagation over the text.
        HyperlinkReference => "hyperlink-reference",
        /// Exactly the hyperlink spans whose targets resolve.
        HyperlinksOnly => "hyperlinks-only",
    }
}

stage_kind! {
    /// Kinds for the primary detection-and-disambiguation stage.
    LinkerKind {
        /// Greedy longest match over the alias table.
        AliasMatcher => "alias-matcher",
        /// Raw NER spans from the annotator, disambiguated by a model or prior.
        TrainedModel => "trained-model",
        /// Replay of precomputed predictions.
        PredictionReplay => "prediction-replay",
    }
}

stage_kind! {
    /// Kinds for the optional coreference stage.
    CorefLinkerKind {
        /// Knowledge-base gender driven pronoun resolution.
        KbCoref => "kb-coref",
    }
}

impl HyperlinkLinkerKind {
    /// Mappings the stage reads.
    #[must_use]
    pub fn required_mappings(self) -> &'static [MappingName] {
        match self {
            HyperlinkLinkerKind::HyperlinkReference => &[
                MappingName::WikipediaWikidata,
                MappingName::Redirects,
                MappingName::Aliases,
                MappingName::Names,
                MappingName::Types,
            ],
            HyperlinkLinkerKind::HyperlinksOnly => {
                &[MappingName::WikipediaWikidata, MappingName::Redirects]
            }
        }
    }

    /// Build the stage.
    pub fn build(self, ctx: &StageContext) -> Result<Box<dyn EntityLinker>> {
        Ok(match self {
            HyperlinkLinkerKind::HyperlinkReference => Box::new(HyperlinkReferenceLinker::new(
                Arc::clone(&ctx.db),
                &ctx.config,
            )),
            HyperlinkLinkerKind::HyperlinksOnly => {
                Box::new(HyperlinksOnlyLinker::new(Arc::clone(&ctx.db)))
            }
        })
    }
}

impl LinkerKind {
    /// Mappings the stage reads.
    #[must_use]
    pub fn required_mappings(self) -> &'static [MappingName] {
        match self {
            LinkerKind::AliasMatcher => &[
                MappingName::Entities,
                MappingName::Aliases,
                MappingName::LinkFrequencies,
                MappingName::UnigramCounts,
            ],
            LinkerKind::TrainedModel => &[
                MappingName::Entities,
                MappingName::Aliases,
                MappingName::LinkFrequencies,
            ],
            LinkerKind::PredictionReplay => {
                &[MappingName::WikipediaWikidata, MappingName::Redirects]
            }
        }
    }

    /// Build the stage.
    pub fn build(self, ctx: &StageContext) -> Result<Box<dyn EntityLinker>> {
        Ok(match self {
            LinkerKind::AliasMatcher => {
                Box::new(AliasMatcherLinker::new(Arc::clone(&ctx.db), &ctx.config)?)
            }
            LinkerKind::TrainedModel => {
                Box::new(TrainedModelLinker::new(Arc::clone(&ctx.db), &ctx.config))
            }
            LinkerKind::PredictionReplay => {
                let path = ctx.predictions.as_ref().ok_or_else(|| {
                    Error::config("prediction-replay needs a predictions file")
                })?;
                Box::new(PredictionReplayLinker::from_file(
                    Arc::clone(&ctx.db),
                    &ctx.config,
                    path,
                )?)
            }
        })
    }
}

impl CorefLinkerKind {
    /// Mappings the stage reads.
    #[must_use]
    pub fn required_mappings(self) -> &'static [MappingName] {
        match self {
            CorefLinkerKind::KbCoref => &[MappingName::Gender],
        }
    }

    /// Build the stage.
    pub fn build(self, ctx: &StageContext) -> Result<Box<dyn EntityLinker>> {
        Ok(match self {
            CorefLinkerKind::KbCoref => Box::new(KbCorefLinker::new(Arc::clone(&ctx.db), &ctx.config)),
        })
    }
}
