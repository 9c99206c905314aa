//! Span conflict resolution.
//!
//! Stages that propose mentions independently arbitrate overlaps through a
//! [`CoveredPositions`] set: every accepted span owns the character
//! positions it covers, and a new proposal that touches an owned position is
//! settled by the set's [`ConflictStrategy`].
//!
//! ```text
//! propose [0,5)  then [0,10)   → [0,10)   (longer evicts shorter)
//! propose [0,10) then [0,5)    → [0,10)   (shorter loses)
//! propose [0,5)  then [3,8)    → [0,5)    (tie: earlier wins)
//! ```
//!
//! Overlap never surfaces as an error; the outcome is always deterministic
//! for a given proposal order.

use kblink_core::Span;
use std::collections::BTreeMap;

// =============================================================================
// Strategy
// =============================================================================

/// Strategy for settling an overlapping proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictStrategy {
    /// Longest span wins; on equal length the earlier proposal is kept.
    #[default]
    LongestSpan,

    /// Any overlap rejects the new proposal.
    RejectOverlap,
}

impl ConflictStrategy {
    fn resolve(self, existing: &Span, candidate: &Span) -> Resolution {
        match self {
            ConflictStrategy::LongestSpan => {
                if candidate.len() > existing.len() {
                    Resolution::Replace
                } else {
                    Resolution::KeepExisting
                }
            }
            ConflictStrategy::RejectOverlap => Resolution::KeepExisting,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Resolution {
    KeepExisting,
    Replace,
}

/// What happened to a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Accepted without conflict.
    Accepted,
    /// Accepted after evicting these spans.
    Replaced(Vec<Span>),
    /// Rejected in favour of existing spans.
    Rejected,
}

impl Admission {
    /// Whether the proposal is now held.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Admission::Rejected)
    }
}

// =============================================================================
// CoveredPositions
// =============================================================================

/// Accepted spans with payloads, and the character positions they own.
#[derive(Debug, Clone)]
pub struct CoveredPositions<T> {
    strategy: ConflictStrategy,
    owners: BTreeMap<usize, Span>,
    accepted: BTreeMap<Span, T>,
}

impl<T> Default for CoveredPositions<T> {
    fn default() -> Self {
        Self::new(ConflictStrategy::default())
    }
}

impl<T> CoveredPositions<T> {
    /// Create an empty set.
    #[must_use]
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self {
            strategy,
            owners: BTreeMap::new(),
            accepted: BTreeMap::new(),
        }
    }

    /// Whether any position of `span` is owned.
    #[must_use]
    pub fn is_covered(&self, span: &Span) -> bool {
        self.owners.range(span.start..span.end).next().is_some()
    }

    /// Distinct spans owning positions of `span`, in span order.
    fn conflicts(&self, span: &Span) -> Vec<Span> {
        let mut owners: Vec<Span> = self
            .owners
            .range(span.start..span.end)
            .map(|(_, owner)| *owner)
            .collect();
        owners.sort_unstable();
        owners.dedup();
        owners
    }

    /// Propose a span.
    pub fn try_add(&mut self, span: Span, value: T) -> Admission {
        let conflicts = self.conflicts(&span);
        if conflicts.is_empty() {
            self.insert(span, value);
            return Admission::Accepted;
        }
        let wins = conflicts
            .iter()
            .all(|existing| self.strategy.resolve(existing, &span) == Resolution::Replace);
        if !wins {
            return Admission::Rejected;
        }
        for evicted in &conflicts {
            self.remove(evicted);
        }
        self.insert(span, value);
        Admission::Replaced(conflicts)
    }

    fn insert(&mut self, span: Span, value: T) {
        for pos in span.positions() {
            self.owners.insert(pos, span);
        }
        self.accepted.insert(span, value);
    }

    fn remove(&mut self, span: &Span) {
        for pos in span.positions() {
            self.owners.remove(&pos);
        }
        self.accepted.remove(span);
    }

    /// Number of accepted spans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    /// Whether nothing has been accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Accepted spans and payloads, in span order.
    pub fn iter(&self) -> impl Iterator<Item = (&Span, &T)> {
        self.accepted.iter()
    }

    /// Consume into accepted payloads, in span order.
    pub fn into_values(self) -> impl Iterator<Item = T> {
        self.accepted.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> Span {
        Span::new(start, end).unwrap()
    }

    fn spans<T>(set: &CoveredPositions<T>) -> Vec<Span> {
        set.iter().map(|(s, _)| *s).collect()
    }

    #[test]
    fn test_longer_evicts_shorter() {
        let mut set = CoveredPositions::new(ConflictStrategy::LongestSpan);
        assert_eq!(set.try_add(span(0, 5), "a"), Admission::Accepted);
        assert_eq!(
            set.try_add(span(0, 10), "b"),
            Admission::Replaced(vec![span(0, 5)])
        );
        assert_eq!(spans(&set), vec![span(0, 10)]);
    }

    #[test]
    fn test_shorter_loses_to_earlier() {
        let mut set = CoveredPositions::new(ConflictStrategy::LongestSpan);
        set.try_add(span(0, 10), "a");
        assert_eq!(set.try_add(span(0, 5), "b"), Admission::Rejected);
        assert_eq!(spans(&set), vec![span(0, 10)]);
    }

    #[test]
    fn test_tie_keeps_earlier() {
        let mut set = CoveredPositions::new(ConflictStrategy::LongestSpan);
        set.try_add(span(0, 5), "a");
        assert_eq!(set.try_add(span(3, 8), "b"), Admission::Rejected);
        assert_eq!(set.into_values().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_must_beat_every_conflict() {
        let mut set = CoveredPositions::new(ConflictStrategy::LongestSpan);
        set.try_add(span(0, 3), "a");
        set.try_add(span(4, 12), "b");
        // Longer than [0,3) but not than [4,12).
        assert_eq!(set.try_add(span(2, 8), "c"), Admission::Rejected);
        assert_eq!(
            set.try_add(span(0, 14), "d"),
            Admission::Replaced(vec![span(0, 3), span(4, 12)])
        );
        assert!(set.is_covered(&span(13, 14)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_reject_overlap_never_evicts() {
        let mut set = CoveredPositions::new(ConflictStrategy::RejectOverlap);
        set.try_add(span(0, 5), ());
        assert!(!set.try_add(span(0, 10), ()).is_accepted());
        assert!(set.try_add(span(5, 10), ()).is_accepted());
    }
}
