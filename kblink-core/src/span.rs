//! Character spans.
//!
//! All offsets in kblink are **character** offsets into the article text
//! (not byte offsets), matching what the document readers and the persisted
//! output use. A span is the half-open interval `[start, end)` with
//! `start < end`.
//!
//! ```text
//! "New York City is big"
//!  0         1
//!  0123456789012345
//!  [============)        Span { start: 0, end: 13 }
//! ```
//!
//! Spans order by `(start, end)`, which is the canonical mention order of
//! an [`Article`](crate::Article).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Half-open character interval `[start, end)`.
///
/// Serialized as a two-element array `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "(usize, usize)", into = "(usize, usize)")]
pub struct Span {
    /// Start offset (inclusive).
    pub start: usize,
    /// End offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a span, rejecting empty or inverted intervals.
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start >= end {
            return Err(Error::invalid_input(format!(
                "span start must be before end, got [{}, {})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Span length in characters.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Spans are never empty once constructed; provided for clippy symmetry.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Two spans conflict iff their half-open intervals intersect.
    #[must_use]
    pub const fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies fully inside this span.
    #[must_use]
    pub const fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Character positions covered by this span.
    #[must_use]
    pub fn positions(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl TryFrom<(usize, usize)> for Span {
    type Error = Error;

    fn try_from((start, end): (usize, usize)) -> Result<Self> {
        Span::new(start, end)
    }
}

impl From<Span> for (usize, usize) {
    fn from(span: Span) -> Self {
        (span.start, span.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> Span {
        Span::new(start, end).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_inverted() {
        assert!(Span::new(3, 3).is_err());
        assert!(Span::new(5, 2).is_err());
        assert_eq!(span(0, 4).len(), 4);
    }

    #[test]
    fn test_half_open_overlap() {
        assert!(span(0, 5).overlaps(&span(4, 6)));
        assert!(!span(0, 5).overlaps(&span(5, 8)));
        assert!(span(2, 3).overlaps(&span(0, 10)));
        assert!(span(0, 10).contains(&span(2, 3)));
    }

    #[test]
    fn test_serializes_as_pair() {
        let json = serde_json::to_string(&span(3, 7)).unwrap();
        assert_eq!(json, "[3,7]");
        let back: Span = serde_json::from_str(&json).unwrap();
        assert_eq!(back, span(3, 7));
        assert!(serde_json::from_str::<Span>("[7,3]").is_err());
    }

    #[test]
    fn test_orders_by_start_then_end() {
        let mut spans = vec![span(5, 9), span(0, 10), span(0, 4)];
        spans.sort();
        assert_eq!(spans, vec![span(0, 4), span(0, 10), span(5, 9)]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn overlap_matches_shared_positions(
                a in 0usize..40, la in 1usize..10, b in 0usize..40, lb in 1usize..10,
            ) {
                let (x, y) = (span(a, a + la), span(b, b + lb));
                let shared = x.positions().any(|p| y.positions().any(|q| p == q));
                prop_assert_eq!(x.overlaps(&y), shared);
                prop_assert_eq!(x.overlaps(&y), y.overlaps(&x));
            }
        }
    }
}
