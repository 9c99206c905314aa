//! # kblink
//!
//! Entity linking against Wikidata.
//!
//! - **Knowledge base**: lazily loaded alias, redirect, anchor-frequency,
//!   gender, name and type tables ([`EntityDatabase`])
//! - **Detection**: greedy longest match over a filtered alias table,
//!   hyperlink seeding with propagation, external NER spans, or replayed
//!   predictions
//! - **Coreference**: pronoun resolution over knowledge-base genders
//! - **Orchestration**: a fixed stage order with first-writer-wins spans
//!   ([`LinkingSystem`])
//!
//! ## Quick Start
//!
//! ```rust
//! use kblink::{Article, EntityDatabase, InMemorySource, LinkerKind, LinkingSystem};
//! use std::sync::Arc;
//!
//! let source = InMemorySource::new()
//!     .entity("Q60", "New York City", 900)
//!     .alias("New York City", "Q60")
//!     .title("New York City", "Q60")
//!     .link_frequency("New York City", "New York City", 40);
//! let db = Arc::new(EntityDatabase::new(source));
//!
//! let system = LinkingSystem::builder(LinkerKind::AliasMatcher).build(db).unwrap();
//! let (article, _) = system
//!     .process(Article::new(1, "", "New York City is big"))
//!     .unwrap();
//! let mention = article.mentions().next().unwrap();
//! assert_eq!(mention.entity_id(), Some("Q60"));
//! ```
//!
//! ## Stages
//!
//! | Slot | Kind | Reads |
//! |------|------|-------|
//! | hyperlink | `hyperlink-reference`, `hyperlinks-only` | titles, redirects (+ aliases, names, types) |
//! | primary | `alias-matcher`, `trained-model`, `prediction-replay` | aliases, anchor frequencies |
//! | coreference | `kb-coref` | genders |
//!
//! All offsets are character offsets into the article text.

#![warn(missing_docs)]

pub mod annotate;
pub mod config;
pub mod conflict;
pub mod coref;
pub mod error;
pub mod io;
pub mod kb;
pub mod linkers;
pub mod offset;
pub mod pipeline;

pub use annotate::{Annotation, Annotator, NerSpan, NullAnnotator, PrecomputedAnnotator, Token};
pub use config::LinkerConfig;
pub use conflict::{Admission, ConflictStrategy, CoveredPositions};
pub use coref::{CorefClusterer, KbCorefLinker};
pub use error::{Error, Result};
pub use kb::{EntityDatabase, InMemorySource, KnowledgeSource, MappingName, TsvSource};
pub use linkers::{
    CorefLinkerKind, EntityLinker, HyperlinkLinkerKind, LinkerKind, StageContext, StageOutcome,
};
pub use pipeline::{ArticleFailure, BatchReport, LinkingSystem, LinkingSystemBuilder};

pub use kblink_core::{
    Article, EntityMention, Gender, Hyperlink, Link, Span, WikidataEntity, UNKNOWN_ENTITY,
};
