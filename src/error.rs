//! Error types for kblink.
//!
//! | Failure | Surface | Effect |
//! |---------|---------|--------|
//! | Malformed knowledge-base table | [`Error::DataLoad`] | fatal, aborts before processing |
//! | Title/alias without KB mapping | counted, tagged `"Unknown"` | processing continues |
//! | Overlapping mention proposals | never an error | resolved by the conflict policy |
//! | Anything failing on one article | [`ArticleFailure`](crate::pipeline::ArticleFailure) | article skipped, batch continues |

use crate::kb::MappingName;
use thiserror::Error;

/// Result type for kblink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for kblink operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A knowledge-base table is structurally malformed.
    #[error("Data load error in {mapping} (line {line}): {message}")]
    DataLoad {
        /// Mapping being loaded.
        mapping: MappingName,
        /// 1-based line number, 0 if not line-oriented.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The external annotator failed or returned inconsistent output.
    #[error("Annotation error: {0}")]
    Annotation(String),

    /// Precomputed predictions could not be read.
    #[error("Prediction error: {0}")]
    Prediction(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the core document model.
    #[error(transparent)]
    Core(#[from] kblink_core::Error),
}

impl Error {
    /// Create a data load error.
    pub fn data_load(mapping: MappingName, line: usize, msg: impl Into<String>) -> Self {
        Error::DataLoad {
            mapping,
            line,
            message: msg.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an annotation error.
    pub fn annotation(msg: impl Into<String>) -> Self {
        Error::Annotation(msg.into())
    }

    /// Create a prediction error.
    pub fn prediction(msg: impl Into<String>) -> Self {
        Error::Prediction(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Whether this error must abort the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DataLoad { .. } | Error::Config(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
