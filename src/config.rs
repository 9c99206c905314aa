//! Run configuration.
//!
//! One [`LinkerConfig`] is built at startup (defaults, optionally a TOML
//! file, then CLI overrides) and handed to every component that needs a
//! path or threshold.
//!
//! ```toml
//! kb_dir = "data/kb"
//! max_alias_tokens = 20
//! uppercase_only = true
//! ner_ignore_labels = ["CARDINAL", "MONEY"]
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Configuration for a linking run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkerConfig {
    /// Directory holding the knowledge-base TSV files.
    pub kb_dir: PathBuf,
    /// Longest alias, in tokens, the greedy matcher tries.
    pub max_alias_tokens: usize,
    /// How far back (in characters) a pronoun may look for an antecedent.
    pub coref_window_chars: usize,
    /// Most characters a propagated match may grow to reach a word boundary.
    pub max_word_extension: usize,
    /// Drop all-lowercase alias matches.
    pub uppercase_only: bool,
    /// One stopword per line; the built-in English list if unset.
    pub stopwords_file: Option<PathBuf>,
    /// Type id of humans.
    pub person_type: String,
    /// Type id of fictional characters.
    pub fictional_character_type: String,
    /// Type id of organizations.
    pub organization_type: String,
    /// NER labels the trained-model stage never links.
    pub ner_ignore_labels: Vec<String>,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            kb_dir: PathBuf::from("data/kb"),
            max_alias_tokens: 20,
            coref_window_chars: 200,
            max_word_extension: 3,
            uppercase_only: false,
            stopwords_file: None,
            person_type: "Q5".to_string(),
            fictional_character_type: "Q95074".to_string(),
            organization_type: "Q43229".to_string(),
            ner_ignore_labels: ["CARDINAL", "MONEY", "ORDINAL", "QUANTITY", "TIME"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl LinkerConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Reject settings no stage can work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_alias_tokens == 0 {
            return Err(Error::config("max_alias_tokens must be at least 1"));
        }
        Ok(())
    }

    /// Whether NER spans with this label are skipped.
    #[must_use]
    pub fn ignores_label(&self, label: &str) -> bool {
        self.ner_ignore_labels.iter().any(|l| l == label)
    }

    /// Load the stopword list.
    pub fn stopwords(&self) -> Result<HashSet<String>> {
        match &self.stopwords_file {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    Error::config(format!("cannot read stopwords {}: {}", path.display(), e))
                })?;
                Ok(text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect())
            }
            None => Ok(ENGLISH_STOPWORDS.iter().map(|w| (*w).to_string()).collect()),
        }
    }
}

/// Built-in English stopwords (lowercase).
pub const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "almost", "also", "although",
    "always", "am", "among", "an", "and", "another", "any", "are", "around", "as", "at", "back",
    "be", "became", "because", "become", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "done", "down", "during", "each",
    "either", "else", "even", "ever", "every", "few", "first", "for", "former", "from", "further",
    "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him", "himself",
    "his", "how", "however", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "last",
    "latter", "least", "less", "made", "many", "may", "me", "might", "more", "most", "much",
    "must", "my", "myself", "neither", "never", "next", "no", "nor", "not", "nothing", "now",
    "of", "off", "often", "on", "once", "one", "only", "or", "other", "others", "otherwise",
    "our", "ours", "ourselves", "out", "over", "own", "per", "perhaps", "put", "rather", "same",
    "say", "see", "seem", "several", "she", "should", "since", "so", "some", "still", "such",
    "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these",
    "they", "this", "those", "though", "through", "thus", "to", "together", "too", "toward",
    "under", "until", "up", "upon", "us", "used", "very", "via", "was", "we", "well", "were",
    "what", "whatever", "when", "where", "whether", "which", "while", "who", "whole", "whom",
    "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your", "yours",
    "yourself", "yourselves",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinkerConfig::default();
        assert_eq!(config.max_alias_tokens, 20);
        assert_eq!(config.coref_window_chars, 200);
        assert!(config.ignores_label("MONEY"));
        assert!(!config.ignores_label("PERSON"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LinkerConfig::from_toml("uppercase_only = true\nkb_dir = \"/tmp/kb\"").unwrap();
        assert!(config.uppercase_only);
        assert_eq!(config.kb_dir, PathBuf::from("/tmp/kb"));
        assert_eq!(config.person_type, "Q5");
    }

    #[test]
    fn test_rejects_unknown_keys_and_zero_window() {
        assert!(LinkerConfig::from_toml("max_alias_tokenz = 3").is_err());
        let err = LinkerConfig::from_toml("max_alias_tokens = 0").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_builtin_stopwords() {
        let words = LinkerConfig::default().stopwords().unwrap();
        assert!(words.contains("the"));
        assert!(!words.contains("paris"));
    }
}
