//! The linking orchestrator.
//!
//! A [`LinkingSystem`] runs a fixed sequence of stages over each article:
//!
//! 1. an optional hyperlink stage,
//! 2. exactly one primary stage,
//! 3. an optional coreference stage.
//!
//! The knowledge-base mappings each stage declares are loaded once, when the
//! system is built, before any article is processed. Articles are processed
//! one at a time; a failure on one article drops that article and the batch
//! carries on.
//!
//! ```rust,ignore
//! use kblink::{EntityDatabase, LinkingSystem, LinkerKind, TsvSource};
//! use std::sync::Arc;
//!
//! let db = Arc::new(EntityDatabase::new(TsvSource::new("data/kb")));
//! let system = LinkingSystem::builder(LinkerKind::AliasMatcher).build(db)?;
//! let linked = system.process(article)?;
//! ```

use crate::annotate::{Annotator, NullAnnotator};
use crate::config::LinkerConfig;
use crate::error::Result;
use crate::kb::{EntityDatabase, MappingName};
use crate::linkers::{
    CorefLinkerKind, EntityLinker, HyperlinkLinkerKind, LinkerKind, StageContext, StageOutcome,
};
use kblink_core::Article;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

// =============================================================================
// Batch report
// =============================================================================

/// An article that was dropped from the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleFailure {
    /// Id of the failed article, if it could be read at all.
    pub article_id: Option<u64>,
    /// What went wrong.
    pub message: String,
}

/// Totals for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Articles processed and emitted.
    pub articles: usize,
    /// Mentions added by all stages.
    pub mentions: usize,
    /// Titles and aliases without a knowledge-base mapping.
    pub unresolved: usize,
    /// Articles that were skipped.
    pub failures: Vec<ArticleFailure>,
}

impl BatchReport {
    fn record_failure(&mut self, article_id: Option<u64>, message: String) {
        match article_id {
            Some(id) => log::warn!("Skipping article {}: {}", id, message),
            None => log::warn!("Skipping unreadable article: {}", message),
        }
        self.failures.push(ArticleFailure {
            article_id,
            message,
        });
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} articles linked, {} mentions added, {} unresolved references, {} articles skipped",
            self.articles,
            self.mentions,
            self.unresolved,
            self.failures.len()
        )
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Configures which stages a [`LinkingSystem`] runs.
pub struct LinkingSystemBuilder {
    hyperlink: Option<HyperlinkLinkerKind>,
    primary: LinkerKind,
    coref: Option<CorefLinkerKind>,
    config: LinkerConfig,
    predictions: Option<PathBuf>,
    annotator: Box<dyn Annotator>,
}

impl LinkingSystemBuilder {
    /// Set the hyperlink stage.
    #[must_use]
    pub fn hyperlink(mut self, kind: HyperlinkLinkerKind) -> Self {
        self.hyperlink = Some(kind);
        self
    }

    /// Set the coreference stage.
    #[must_use]
    pub fn coref(mut self, kind: CorefLinkerKind) -> Self {
        self.coref = Some(kind);
        self
    }

    /// Use this configuration instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: LinkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Prediction file for [`LinkerKind::PredictionReplay`].
    #[must_use]
    pub fn predictions(mut self, path: impl Into<PathBuf>) -> Self {
        self.predictions = Some(path.into());
        self
    }

    /// Annotator providing tokens, sentences and NER spans.
    #[must_use]
    pub fn annotator(mut self, annotator: impl Annotator + 'static) -> Self {
        self.annotator = Box::new(annotator);
        self
    }

    /// Mappings the selected stages need.
    #[must_use]
    pub fn required_mappings(&self) -> BTreeSet<MappingName> {
        let hyperlink = self.hyperlink.map_or(&[][..], HyperlinkLinkerKind::required_mappings);
        let coref = self.coref.map_or(&[][..], CorefLinkerKind::required_mappings);
        hyperlink
            .iter()
            .chain(self.primary.required_mappings())
            .chain(coref)
            .copied()
            .collect()
    }

    /// Load the required mappings into `db` and construct the stages.
    ///
    /// Fails on configuration errors and on malformed knowledge-base data.
    pub fn build(self, db: Arc<EntityDatabase>) -> Result<LinkingSystem> {
        self.config.validate()?;
        let mappings = self.required_mappings();
        db.ensure_all(&mappings)?;

        let ctx = StageContext {
            db: Arc::clone(&db),
            config: self.config,
            predictions: self.predictions,
        };
        let mut stages: Vec<Box<dyn EntityLinker>> = Vec::with_capacity(3);
        if let Some(kind) = self.hyperlink {
            stages.push(kind.build(&ctx)?);
        }
        stages.push(self.primary.build(&ctx)?);
        if let Some(kind) = self.coref {
            stages.push(kind.build(&ctx)?);
        }
        for stage in &stages {
            log::info!("Initialized stage {}", stage.name());
        }
        Ok(LinkingSystem {
            db,
            stages,
            annotator: self.annotator,
        })
    }
}

// =============================================================================
// LinkingSystem
// =============================================================================

/// A ready-to-run stage sequence over a loaded knowledge base.
pub struct LinkingSystem {
    db: Arc<EntityDatabase>,
    stages: Vec<Box<dyn EntityLinker>>,
    annotator: Box<dyn Annotator>,
}

impl fmt::Debug for LinkingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkingSystem")
            .field("stages", &self.stage_names())
            .field("annotator", &self.annotator.name())
            .finish_non_exhaustive()
    }
}

impl LinkingSystem {
    /// Start configuring a system around a primary stage.
    #[must_use]
    pub fn builder(primary: LinkerKind) -> LinkingSystemBuilder {
        LinkingSystemBuilder {
            hyperlink: None,
            primary,
            coref: None,
            config: LinkerConfig::default(),
            predictions: None,
            annotator: Box::new(NullAnnotator),
        }
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// The shared knowledge base.
    #[must_use]
    pub fn database(&self) -> &Arc<EntityDatabase> {
        &self.db
    }

    /// Run every stage over one article.
    ///
    /// On error the partially linked article is dropped.
    pub fn process(&self, mut article: Article) -> Result<(Article, StageOutcome)> {
        let annotation = self.annotator.annotate(&article)?;
        let mut total = StageOutcome::default();
        for stage in &self.stages {
            let outcome = stage.link_entities(&mut article, &annotation)?;
            log::debug!(
                "Article {}: {} added {} mentions ({} unresolved)",
                article.id,
                stage.name(),
                outcome.added,
                outcome.unresolved
            );
            total += outcome;
        }
        Ok((article, total))
    }

    /// Process a stream of articles, handing each linked one to `emit`.
    ///
    /// Unreadable articles and per-article failures are recorded in the
    /// report and skipped. Fatal errors, and errors from `emit`, abort the run.
    pub fn run<I, F>(&self, articles: I, mut emit: F) -> Result<BatchReport>
    where
        I: IntoIterator<Item = Result<Article>>,
        F: FnMut(&Article) -> Result<()>,
    {
        let mut report = BatchReport::default();
        for item in articles {
            let article = match item {
                Ok(article) => article,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    report.record_failure(None, e.to_string());
                    continue;
                }
            };
            let id = article.id;
            match self.process(article) {
                Ok((linked, outcome)) => {
                    emit(&linked)?;
                    report.articles += 1;
                    report.mentions += outcome.added;
                    report.unresolved += outcome.unresolved;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => report.record_failure(Some(id), e.to_string()),
            }
        }
        log::info!("{}", report);
        Ok(report)
    }
}
