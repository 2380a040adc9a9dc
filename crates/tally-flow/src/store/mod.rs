//! Pluggable persistence for branches and branch statistics.
//!
//! The reconciler only needs a handful of find/save/delete operations, one
//! trait per entity:
//!
//! - [`BranchStore`]: read-only view of the repository's branches
//! - [`BranchStatisticStore`]: the per-branch aggregate row
//! - [`BranchTextUnitStatisticStore`]: the per-text-unit rows of a branch
//! - [`TextUnitMapping`]: which text units belong to a branch
//!
//! ## Design Principles
//!
//! - **Store-assigned identity**: inserts return the persisted row with its id
//! - **Bulk stale removal**: stale rows are deleted in one call, never row by row
//! - **Testability**: [`memory::InMemoryStore`] implements every trait

pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;

use tally_core::{BranchId, BranchStatisticId, RepositoryId, TextUnitId};

use crate::error::Result;
use crate::model::{Branch, BranchStatistic, BranchTextUnitStatistic, NewBranchTextUnitStatistic};

/// Read access to a repository's branches.
#[async_trait]
pub trait BranchStore: Send + Sync {
    /// Gets a branch by ID.
    ///
    /// Returns `None` if the branch does not exist.
    async fn find_branch(&self, branch_id: BranchId) -> Result<Option<Branch>>;

    /// Returns the non-deleted, named, non-primary branches of a repository.
    async fn find_processable(
        &self,
        repository_id: RepositoryId,
        primary_branch_name: &str,
    ) -> Result<Vec<Branch>>;
}

/// Persistence for the aggregate statistic of each branch.
#[async_trait]
pub trait BranchStatisticStore: Send + Sync {
    /// Gets the statistic of a branch, if reconciliation ever ran for it.
    async fn find_by_branch(&self, branch_id: BranchId) -> Result<Option<BranchStatistic>>;

    /// Inserts a zero-count statistic for a branch and assigns its identity.
    ///
    /// Fails if the branch already has a statistic.
    async fn create_for_branch(&self, branch_id: BranchId) -> Result<BranchStatistic>;

    /// Updates the counts of an existing statistic.
    async fn save_statistic(&self, statistic: &BranchStatistic) -> Result<()>;
}

/// Persistence for per-text-unit statistics of a branch.
#[async_trait]
pub trait BranchTextUnitStatisticStore: Send + Sync {
    /// Returns all rows under a branch statistic.
    async fn find_by_branch_statistic(
        &self,
        branch_statistic_id: BranchStatisticId,
    ) -> Result<Vec<BranchTextUnitStatistic>>;

    /// Gets the row for a (branch statistic, text unit) pair.
    async fn find_by_statistic_and_text_unit(
        &self,
        branch_statistic_id: BranchStatisticId,
        text_unit_id: TextUnitId,
    ) -> Result<Option<BranchTextUnitStatistic>>;

    /// Inserts a row and assigns its identity.
    async fn create_text_unit_statistic(
        &self,
        row: NewBranchTextUnitStatistic,
    ) -> Result<BranchTextUnitStatistic>;

    /// Updates the counts of an existing row.
    async fn save_text_unit_statistic(&self, row: &BranchTextUnitStatistic) -> Result<()>;

    /// Deletes the rows of a branch whose text unit is in `text_unit_ids`.
    ///
    /// An empty id set is a no-op returning 0.
    async fn delete_by_branch_and_text_unit_ids_in(
        &self,
        branch_id: BranchId,
        text_unit_ids: &HashSet<TextUnitId>,
    ) -> Result<u64>;
}

/// Authoritative mapping from a branch to its candidate text units.
#[async_trait]
pub trait TextUnitMapping: Send + Sync {
    /// Returns the ids of the text units extracted for a branch.
    async fn find_text_unit_ids_by_branch(&self, branch_id: BranchId) -> Result<Vec<TextUnitId>>;
}
