//! Set difference between a desired key set and a currently stored key set.
//!
//! Both reconciliation flows reduce to the same question: given what *should*
//! exist (`desired`) and what *does* exist (`current`), which stored entries
//! are stale and which desired entries are missing?
//!
//! - `stale = current \ desired`
//! - `missing = desired \ current`
//!
//! Results are sets, so they are duplicate-free and carry no ordering.

use std::collections::HashSet;
use std::hash::Hash;

/// The two halves of a symmetric difference between key sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDiff<K: Eq + Hash> {
    /// Keys present in the current set but not in the desired set.
    pub stale: HashSet<K>,
    /// Keys present in the desired set but not in the current set.
    pub missing: HashSet<K>,
}

impl<K: Eq + Hash + Clone> KeyDiff<K> {
    /// Computes both halves of the difference.
    #[must_use]
    pub fn compute(desired: &HashSet<K>, current: &HashSet<K>) -> Self {
        Self {
            stale: stale_keys(desired, current),
            missing: missing_keys(desired, current),
        }
    }

    /// Returns true when the current set already equals the desired set.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.stale.is_empty() && self.missing.is_empty()
    }
}

/// Returns the keys of `current` that are absent from `desired`.
#[must_use]
pub fn stale_keys<K: Eq + Hash + Clone>(desired: &HashSet<K>, current: &HashSet<K>) -> HashSet<K> {
    current.difference(desired).cloned().collect()
}

/// Returns the keys of `desired` that are absent from `current`.
#[must_use]
pub fn missing_keys<K: Eq + Hash + Clone>(
    desired: &HashSet<K>,
    current: &HashSet<K>,
) -> HashSet<K> {
    desired.difference(current).cloned().collect()
}
