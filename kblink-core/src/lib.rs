//! # kblink-core
//!
//! Core types for kblink: shared data structures used across all crates.
//!
//! This crate provides:
//! - **Spans**: `Span`, half-open character intervals
//! - **Mentions**: `EntityMention`, `Link`, the `UNKNOWN_ENTITY` sentinel
//! - **Documents**: `Article`, `Hyperlink`
//! - **Knowledge-base records**: `WikidataEntity`, `Gender`
//!
//! The linker crate depends on `kblink-core` so that readers, linkers and
//! writers all agree on one document model.

#![warn(missing_docs)]

pub mod article;
pub mod entity;
pub mod error;
pub mod mention;
pub mod span;

pub use article::{Article, Hyperlink};
pub use entity::{Gender, WikidataEntity};
pub use error::{Error, Result};
pub use mention::{EntityMention, Link, UNKNOWN_ENTITY};
pub use span::Span;
