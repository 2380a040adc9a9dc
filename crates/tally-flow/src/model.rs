//! Branch and statistic entities.
//!
//! `Branch` rows are owned by the repository and only read here.
//! `BranchStatistic` and `BranchTextUnitStatistic` rows are derived data,
//! rewritten by [`crate::statistics::StatisticsReconciler`].

use serde::{Deserialize, Serialize};

use tally_core::{BranchId, BranchStatisticId, BranchTextUnitStatisticId, RepositoryId, TextUnitId};

/// Default name of a repository's primary line of development.
pub const PRIMARY_BRANCH: &str = "master";

/// A unit of translation work tracked against a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Branch identity.
    pub id: BranchId,
    /// Owning repository.
    pub repository_id: RepositoryId,
    /// Branch name. `None` marks content that is not on a branch at all.
    pub name: Option<String>,
    /// Whether the branch was deleted.
    pub deleted: bool,
}

impl Branch {
    /// Creates a live, named branch.
    #[must_use]
    pub fn new(id: BranchId, repository_id: RepositoryId, name: impl Into<String>) -> Self {
        Self {
            id,
            repository_id,
            name: Some(name.into()),
            deleted: false,
        }
    }

    /// Creates a nameless pseudo-branch.
    #[must_use]
    pub const fn unnamed(id: BranchId, repository_id: RepositoryId) -> Self {
        Self {
            id,
            repository_id,
            name: None,
            deleted: false,
        }
    }

    /// Marks the branch as deleted.
    #[must_use]
    pub const fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Returns the name for display, `-` when unnamed.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("-")
    }

    /// Returns true if statistics should be computed for this branch.
    ///
    /// Deleted branches, nameless pseudo-branches and the primary branch are
    /// never processed.
    #[must_use]
    pub fn is_processable(&self, primary_branch_name: &str) -> bool {
        !self.deleted && self.name.as_deref().is_some_and(|name| name != primary_branch_name)
    }
}

/// Cached translation-statistics aggregate of a branch (one per branch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchStatistic {
    /// Statistic identity.
    pub id: BranchStatisticId,
    /// Owning branch.
    pub branch_id: BranchId,
    /// Sum of total counts of the branch's text units.
    pub total_count: u64,
    /// Sum of for-translation counts of the branch's text units.
    pub for_translation_count: u64,
}

/// Per-text-unit statistic of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchTextUnitStatistic {
    /// Row identity.
    pub id: BranchTextUnitStatisticId,
    /// Parent branch statistic.
    pub branch_statistic_id: BranchStatisticId,
    /// Referenced text unit.
    pub text_unit_id: TextUnitId,
    /// Number of units across locales.
    pub total_count: u64,
    /// Number of units still requiring translation.
    pub for_translation_count: u64,
}

impl BranchTextUnitStatistic {
    /// Returns true if the stored counts already equal the given ones.
    #[must_use]
    pub const fn has_counts(&self, counts: TextUnitCounts) -> bool {
        self.total_count == counts.total && self.for_translation_count == counts.for_translation
    }
}

/// Insert payload for a [`BranchTextUnitStatistic`]; the store assigns the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewBranchTextUnitStatistic {
    /// Parent branch statistic.
    pub branch_statistic_id: BranchStatisticId,
    /// Referenced text unit.
    pub text_unit_id: TextUnitId,
    /// Counts to store.
    pub counts: TextUnitCounts,
}

/// The two counts tracked per text unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextUnitCounts {
    /// Units across locales.
    pub total: u64,
    /// Units still requiring translation.
    pub for_translation: u64,
}
