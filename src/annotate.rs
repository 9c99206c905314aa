//! The annotation capability: tokens, sentences, tags and raw NER spans.
//!
//! Tokenization, POS/dependency parsing and pretrained NER are external.
//! Linkers only consume the [`Annotation`] an [`Annotator`] returns, so any
//! NLP pipeline can feed them by writing its output as JSONL and loading it
//! with [`PrecomputedAnnotator`].
//!
//! All offsets are character offsets into the article text.

use crate::error::{Error, Result};
use kblink_core::{Article, Span};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// A token with its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Character span.
    pub span: Span,
    /// Surface text.
    pub text: String,
    /// Fine-grained POS tag (Penn Treebank, e.g. `NNP`).
    #[serde(default)]
    pub tag: String,
    /// Dependency relation to the head (e.g. `nsubj`, `expl`).
    #[serde(default)]
    pub dep: String,
}

/// A raw named-entity span from an external recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NerSpan {
    /// Character span.
    pub span: Span,
    /// Recognizer label (e.g. `PERSON`, `MONEY`).
    pub label: String,
    /// Entity id assigned by a trained model, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

/// Annotator output for one article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotation {
    /// Tokens in text order.
    pub tokens: Vec<Token>,
    /// Sentence spans in text order.
    pub sentences: Vec<Span>,
    /// Raw NER spans.
    pub entities: Vec<NerSpan>,
}

impl Annotation {
    /// Token starting exactly at `offset`.
    #[must_use]
    pub fn token_at(&self, offset: usize) -> Option<&Token> {
        self.tokens
            .binary_search_by_key(&offset, |t| t.span.start)
            .ok()
            .map(|i| &self.tokens[i])
    }

    /// Tokens lying entirely inside `span`.
    pub fn tokens_in<'a>(&'a self, span: &'a Span) -> impl Iterator<Item = &'a Token> + 'a {
        self.tokens
            .iter()
            .skip_while(move |t| t.span.start < span.start)
            .take_while(move |t| t.span.start < span.end)
            .filter(move |t| t.span.end <= span.end)
    }

    /// Dependency relations of the tokens inside `span`.
    #[must_use]
    pub fn deps_in(&self, span: &Span) -> Vec<String> {
        self.tokens_in(span).map(|t| t.dep.clone()).collect()
    }

    /// Index, within its sentence, of the first token starting at or after
    /// `offset`. `None` without sentence information.
    #[must_use]
    pub fn token_index_in_sentence(&self, offset: usize) -> Option<usize> {
        let sentence = self
            .sentences
            .iter()
            .find(|s| s.start <= offset && offset < s.end)?;
        Some(
            self.tokens
                .iter()
                .filter(|t| t.span.start >= sentence.start && t.span.start < offset)
                .count(),
        )
    }

    /// Whether `offset` begins a sentence-initial token.
    #[must_use]
    pub fn starts_sentence(&self, offset: usize) -> bool {
        self.token_index_in_sentence(offset) == Some(0)
    }

    /// Whether the token at `offset` is a non-referential ("expletive") use,
    /// as in "It is raining".
    #[must_use]
    pub fn is_expletive(&self, offset: usize) -> bool {
        self.token_at(offset).is_some_and(|t| t.dep == "expl")
    }

    /// Check that every span fits the article text and tokens are ordered.
    pub fn validate(&self, article: &Article) -> Result<()> {
        let len = article.char_len();
        let spans = self
            .tokens
            .iter()
            .map(|t| t.span)
            .chain(self.sentences.iter().copied())
            .chain(self.entities.iter().map(|e| e.span));
        for span in spans {
            if span.end > len {
                return Err(Error::annotation(format!(
                    "article {}: span {} exceeds text length {}",
                    article.id, span, len
                )));
            }
        }
        if self.tokens.windows(2).any(|w| w[0].span.start >= w[1].span.start) {
            return Err(Error::annotation(format!(
                "article {}: tokens are not in text order",
                article.id
            )));
        }
        Ok(())
    }
}

/// Produces the [`Annotation`] for an article.
pub trait Annotator: Send + Sync {
    /// Annotate one article.
    fn annotate(&self, article: &Article) -> Result<Annotation>;

    /// Name for logs.
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Annotator that returns nothing.
///
/// Sentence-start and expletive checks then never fire, and pronoun-based
/// coreference finds no pronouns.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAnnotator;

impl Annotator for NullAnnotator {
    fn annotate(&self, _article: &Article) -> Result<Annotation> {
        Ok(Annotation::default())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[derive(Debug, Deserialize)]
struct AnnotationRecord {
    id: u64,
    #[serde(flatten)]
    annotation: Annotation,
}

/// Annotations computed ahead of time, keyed by article id.
///
/// One JSON object per line:
/// `{"id": 7, "tokens": [...], "sentences": [[0, 10]], "entities": [...]}`.
/// Articles without a line get an empty annotation.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedAnnotator {
    by_article: HashMap<u64, Annotation>,
}

impl PrecomputedAnnotator {
    /// Build from already-parsed annotations.
    #[must_use]
    pub fn new(by_article: HashMap<u64, Annotation>) -> Self {
        Self { by_article }
    }

    /// Read JSONL annotations.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut by_article = HashMap::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: AnnotationRecord = serde_json::from_str(&line)
                .map_err(|e| Error::annotation(format!("line {}: {}", i + 1, e)))?;
            by_article.insert(record.id, record.annotation);
        }
        log::info!("Loaded precomputed annotations for {} articles", by_article.len());
        Ok(Self { by_article })
    }

    /// Read JSONL annotations from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Number of annotated articles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_article.len()
    }

    /// Whether no article is annotated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_article.is_empty()
    }
}

impl Annotator for PrecomputedAnnotator {
    fn annotate(&self, article: &Article) -> Result<Annotation> {
        match self.by_article.get(&article.id) {
            Some(annotation) => {
                annotation.validate(article)?;
                Ok(annotation.clone())
            }
            None => {
                log::debug!("No precomputed annotation for article {}", article.id);
                Ok(Annotation::default())
            }
        }
    }

    fn name(&self) -> &'static str {
        "precomputed"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn token(start: usize, text: &str, tag: &str, dep: &str) -> Token {
        Token {
            span: Span::new(start, start + text.chars().count()).unwrap(),
            text: text.to_string(),
            tag: tag.to_string(),
            dep: dep.to_string(),
        }
    }

    fn raining() -> Annotation {
        // "Paris is nice. It is raining."
        Annotation {
            tokens: vec![
                token(0, "Paris", "NNP", "nsubj"),
                token(6, "is", "VBZ", "ROOT"),
                token(9, "nice", "JJ", "acomp"),
                token(13, ".", ".", "punct"),
                token(15, "It", "PRP", "expl"),
                token(18, "is", "VBZ", "aux"),
                token(21, "raining", "VBG", "ROOT"),
                token(28, ".", ".", "punct"),
            ],
            sentences: vec![Span::new(0, 14).unwrap(), Span::new(15, 29).unwrap()],
            entities: Vec::new(),
        }
    }

    #[test]
    fn test_sentence_positions() {
        let annotation = raining();
        assert!(annotation.starts_sentence(0));
        assert!(annotation.starts_sentence(15));
        assert_eq!(annotation.token_index_in_sentence(21), Some(2));
        assert!(!annotation.starts_sentence(6));
        assert!(!Annotation::default().starts_sentence(0));
    }

    #[test]
    fn test_expletive_and_deps() {
        let annotation = raining();
        assert!(annotation.is_expletive(15));
        assert!(!annotation.is_expletive(0));
        let span = Span::new(0, 5).unwrap();
        assert_eq!(annotation.deps_in(&span), vec!["nsubj"]);
    }

    #[test]
    fn test_precomputed_lookup_and_validation() {
        let jsonl = concat!(
            r#"{"id": 1, "tokens": [{"span": [0, 4], "text": "Mary", "tag": "NNP", "dep": "nsubj"}]}"#,
            "\n\n",
            r#"{"id": 2, "entities": [{"span": [0, 40], "label": "PERSON"}]}"#,
        );
        let annotator = PrecomputedAnnotator::from_reader(jsonl.as_bytes()).unwrap();
        assert_eq!(annotator.len(), 2);

        let mary = Article::new(1, "", "Mary left.");
        assert_eq!(annotator.annotate(&mary).unwrap().tokens.len(), 1);

        let short = Article::new(2, "", "Too short");
        assert!(annotator.annotate(&short).is_err());

        let missing = Article::new(3, "", "Nothing here");
        assert_eq!(annotator.annotate(&missing).unwrap(), Annotation::default());
    }
}
