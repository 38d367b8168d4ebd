//! Sparse annotation sets
//!
//! A [`SparseAnnotations`] set is a partial key/value map that can also carry
//! explicit removals ("tombstones"). Unioning two sets lets the later set
//! overwrite or tombstone keys of the earlier one, which is how provider
//! annotations are layered on top of each other.
//!
//! Canonical objects expose [`Annotations`], the live view with tombstones
//! dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Partial annotation map with tombstones
///
/// `None` values are tombstones recording that the key was removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseAnnotations {
    entries: BTreeMap<String, Option<String>>,
}

impl SparseAnnotations {
    /// An empty set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a set
    pub fn builder() -> AnnotationsBuilder {
        AnnotationsBuilder::default()
    }

    /// Union `other` on top of `self`; `other` wins on every shared key,
    /// including tombstones.
    pub fn union(&self, other: &SparseAnnotations) -> SparseAnnotations {
        let mut entries = self.entries.clone();
        for (key, value) in &other.entries {
            entries.insert(key.clone(), value.clone());
        }
        SparseAnnotations { entries }
    }

    /// Union several sets left to right
    pub fn union_all<'a>(sets: impl IntoIterator<Item = &'a SparseAnnotations>) -> Self {
        sets.into_iter()
            .fold(SparseAnnotations::empty(), |acc, set| acc.union(set))
    }

    /// Live value for `key`, `None` when absent or tombstoned
    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.as_deref())
    }

    /// Whether `key` carries a tombstone
    pub fn is_removed(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(None))
    }

    /// All keys, tombstoned ones included
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Whether the set holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries, tombstones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Live view with tombstones dropped
    pub fn to_annotations(&self) -> Annotations {
        Annotations {
            entries: self
                .entries
                .iter()
                .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
                .collect(),
        }
    }
}

/// Builder for [`SparseAnnotations`]
#[derive(Debug, Clone, Default)]
pub struct AnnotationsBuilder {
    entries: BTreeMap<String, Option<String>>,
}

impl AnnotationsBuilder {
    /// Assign `key = value`
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), Some(value.into()));
        self
    }

    /// Record a tombstone for `key`
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.entries.insert(key.into(), None);
        self
    }

    /// Finish the set
    pub fn build(self) -> SparseAnnotations {
        SparseAnnotations {
            entries: self.entries,
        }
    }
}

/// Live annotations of a canonical device or port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    entries: BTreeMap<String, String>,
}

impl Annotations {
    /// Value for `key`
    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// All keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Whether no annotation is set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of annotations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over key/value pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
