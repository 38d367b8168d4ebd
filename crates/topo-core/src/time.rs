//! Logical timestamps
//!
//! Submissions are ordered by a [`Timestamp`] issued by the device clock
//! service: a mastership term paired with a sequence number that increases
//! monotonically within the term. Ordering is lexicographic, so any
//! timestamp from a later term beats every timestamp from an earlier one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Totally ordered logical timestamp
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Timestamp {
    /// Mastership term the timestamp was issued in
    pub term: u64,
    /// Sequence number within the term
    pub sequence: u64,
}

impl Timestamp {
    /// Create a timestamp
    pub fn new(term: u64, sequence: u64) -> Self {
        Self { term, sequence }
    }

    /// Strictly newer than `other`
    pub fn is_newer_than(&self, other: &Timestamp) -> bool {
        self > other
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.term, self.sequence)
    }
}

/// A value paired with the timestamp it was accepted at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    /// The value
    pub value: T,
    /// When the value was issued
    pub timestamp: Timestamp,
}

impl<T> Timestamped<T> {
    /// Pair `value` with `timestamp`
    pub fn new(value: T, timestamp: Timestamp) -> Self {
        Self { value, timestamp }
    }

    /// Whether this value was issued strictly after `other`
    pub fn is_newer_than(&self, other: &Timestamp) -> bool {
        self.timestamp.is_newer_than(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_term_beats_higher_sequence() {
        let old = Timestamp::new(1, 900);
        let new = Timestamp::new(2, 1);
        assert!(new.is_newer_than(&old));
        assert!(!old.is_newer_than(&new));
    }

    #[test]
    fn equal_timestamps_are_not_newer() {
        let ts = Timestamp::new(3, 7);
        assert!(!ts.is_newer_than(&ts));
        assert!(!Timestamped::new("x", ts).is_newer_than(&ts));
    }

    #[test]
    fn timestamps_survive_bincode() {
        let ts = Timestamped::new(42u32, Timestamp::new(5, 11));
        let bytes = bincode::serialize(&ts).unwrap();
        let back: Timestamped<u32> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, ts);
    }
}
