//! Discovery identifiers and the batches they are split into.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// The ordered, de-duplicated set of keys discovered at the start of a run.
///
/// Deletion is driven by this set alone, never by which items were
/// successfully fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierSet {
    ordered: Vec<String>,
}

impl IdentifierSet {
    /// Build from a raw discovery listing.
    ///
    /// Blank entries are skipped and later duplicates dropped, keeping the
    /// first-seen order. Returns the set and how many entries were discarded.
    #[must_use]
    pub fn from_discovered(raw: Vec<String>) -> (Self, usize) {
        let total = raw.len();
        let mut seen = HashSet::with_capacity(total);
        let ordered: Vec<String> = raw
            .into_iter()
            .filter(|id| !id.trim().is_empty())
            .filter(|id| seen.insert(id.clone()))
            .collect();
        let discarded = total - ordered.len();
        (Self { ordered }, discarded)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.ordered
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.ordered.iter().any(|id| id == identifier)
    }

    /// The keys as a set, for the delete-orphans step.
    #[must_use]
    pub fn to_key_set(&self) -> HashSet<String> {
        self.ordered.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for IdentifierSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::from_discovered(iter.into_iter().map(Into::into).collect()).0
    }
}

/// A bounded, consecutive slice of the identifier set handled by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Position of this batch in the chunked sequence, starting at 0.
    pub index: usize,
    pub identifiers: Vec<String>,
}

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}
