//! Third-person pronouns and their gender class.

use crate::annotate::Annotation;
use kblink_core::{Gender, Span};

/// Gender class of a third-person pronoun, case-insensitive.
#[must_use]
pub fn pronoun_gender(word: &str) -> Option<Gender> {
    let gender = match word.to_lowercase().as_str() {
        "he" | "him" | "his" | "himself" => Gender::Male,
        "she" | "her" | "hers" | "herself" => Gender::Female,
        "it" | "its" | "itself" => Gender::Neutral,
        "they" | "them" | "their" | "theirs" | "themselves" | "themself" => Gender::Other,
        _ => return None,
    };
    Some(gender)
}

/// Whether `word` is one of the known pronouns.
#[must_use]
pub fn is_pronoun(word: &str) -> bool {
    pronoun_gender(word).is_some()
}

/// A pronoun occurrence awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pronoun {
    /// Character span of the token.
    pub span: Span,
    /// Surface form as written.
    pub text: String,
    /// Gender class from the pronoun table.
    pub gender: Gender,
}

impl Pronoun {
    /// Literal "it", the only form checked for expletive use.
    #[must_use]
    pub fn is_it(&self) -> bool {
        self.text.eq_ignore_ascii_case("it")
    }
}

/// Pronoun tokens of an annotation, in text order.
#[must_use]
pub fn detect_pronouns(annotation: &Annotation) -> Vec<Pronoun> {
    annotation
        .tokens
        .iter()
        .filter_map(|token| {
            pronoun_gender(&token.text).map(|gender| Pronoun {
                span: token.span,
                text: token.text.clone(),
                gender,
            })
        })
        .collect()
}
