//! In-memory store implementation for testing.
//!
//! This module provides [`InMemoryStore`], a simple in-memory implementation of
//! every store trait suitable for testing and development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process coordination
//! - **Single-process only**: State is not shared across process boundaries
//! - **No persistence**: All state is lost when the process exits

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use tally_core::{
    BranchId, BranchStatisticId, BranchTextUnitStatisticId, RepositoryId, TextUnitId,
};

use super::{BranchStatisticStore, BranchStore, BranchTextUnitStatisticStore, TextUnitMapping};
use crate::error::{Error, Result};
use crate::model::{Branch, BranchStatistic, BranchTextUnitStatistic, NewBranchTextUnitStatistic};

#[derive(Debug, Default)]
struct StoreState {
    branches: BTreeMap<BranchId, Branch>,
    statistics: BTreeMap<BranchStatisticId, BranchStatistic>,
    text_unit_statistics: BTreeMap<BranchTextUnitStatisticId, BranchTextUnitStatistic>,
    mappings: HashMap<BranchId, Vec<TextUnitId>>,
    next_id: i64,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn statistic_of(&self, branch_id: BranchId) -> Option<&BranchStatistic> {
        self.statistics.values().find(|s| s.branch_id == branch_id)
    }
}

/// In-memory store for testing.
///
/// Provides a simple, thread-safe implementation of the store traits using
/// `RwLock` for synchronization. Uniqueness of (branch) statistics and of
/// (statistic, text unit) rows is enforced like a database constraint.
///
/// ## Example
///
/// ```rust
/// use tally_core::{BranchId, RepositoryId};
/// use tally_flow::model::Branch;
/// use tally_flow::store::memory::InMemoryStore;
///
/// let store = InMemoryStore::new();
/// store
///     .insert_branch(Branch::new(BranchId::new(1), RepositoryId::new(1), "feature-x"))
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_branch(&self, branch: Branch) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.branches.insert(branch.id, branch);
        Ok(())
    }

    /// Replaces the text units mapped to a branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_text_unit_ids(
        &self,
        branch_id: BranchId,
        text_unit_ids: impl IntoIterator<Item = TextUnitId>,
    ) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state
            .mappings
            .insert(branch_id, text_unit_ids.into_iter().collect());
        Ok(())
    }

    /// Returns the number of branch statistics stored for a branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn statistic_count(&self, branch_id: BranchId) -> Result<usize> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .statistics
            .values()
            .filter(|s| s.branch_id == branch_id)
            .count())
    }

    /// Returns the per-text-unit rows of a branch, ordered by text unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn text_unit_statistics_of(
        &self,
        branch_id: BranchId,
    ) -> Result<Vec<BranchTextUnitStatistic>> {
        let state = self.state.read().map_err(poison_err)?;
        let Some(statistic_id) = state.statistic_of(branch_id).map(|s| s.id) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<_> = state
            .text_unit_statistics
            .values()
            .filter(|row| row.branch_statistic_id == statistic_id)
            .cloned()
            .collect();
        drop(state);
        rows.sort_by_key(|row| row.text_unit_id);
        Ok(rows)
    }
}

#[async_trait]
impl BranchStore for InMemoryStore {
    async fn find_branch(&self, branch_id: BranchId) -> Result<Option<Branch>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.branches.get(&branch_id).cloned())
    }

    async fn find_processable(
        &self,
        repository_id: RepositoryId,
        primary_branch_name: &str,
    ) -> Result<Vec<Branch>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .branches
            .values()
            .filter(|b| b.repository_id == repository_id && b.is_processable(primary_branch_name))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BranchStatisticStore for InMemoryStore {
    async fn find_by_branch(&self, branch_id: BranchId) -> Result<Option<BranchStatistic>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.statistic_of(branch_id).cloned())
    }

    async fn create_for_branch(&self, branch_id: BranchId) -> Result<BranchStatistic> {
        let mut state = self.state.write().map_err(poison_err)?;
        if state.statistic_of(branch_id).is_some() {
            return Err(Error::storage(format!(
                "unique constraint violated: branch {branch_id} already has a statistic"
            )));
        }

        let statistic = BranchStatistic {
            id: BranchStatisticId::new(state.next_id()),
            branch_id,
            total_count: 0,
            for_translation_count: 0,
        };
        state.statistics.insert(statistic.id, statistic.clone());
        Ok(statistic)
    }

    async fn save_statistic(&self, statistic: &BranchStatistic) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let Some(stored) = state.statistics.get_mut(&statistic.id) else {
            return Err(
                tally_core::Error::resource_not_found("branch statistic", statistic.id).into(),
            );
        };
        *stored = statistic.clone();
        Ok(())
    }
}

#[async_trait]
impl BranchTextUnitStatisticStore for InMemoryStore {
    async fn find_by_branch_statistic(
        &self,
        branch_statistic_id: BranchStatisticId,
    ) -> Result<Vec<BranchTextUnitStatistic>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .text_unit_statistics
            .values()
            .filter(|row| row.branch_statistic_id == branch_statistic_id)
            .cloned()
            .collect())
    }

    async fn find_by_statistic_and_text_unit(
        &self,
        branch_statistic_id: BranchStatisticId,
        text_unit_id: TextUnitId,
    ) -> Result<Option<BranchTextUnitStatistic>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .text_unit_statistics
            .values()
            .find(|row| {
                row.branch_statistic_id == branch_statistic_id && row.text_unit_id == text_unit_id
            })
            .cloned())
    }

    async fn create_text_unit_statistic(
        &self,
        row: NewBranchTextUnitStatistic,
    ) -> Result<BranchTextUnitStatistic> {
        let mut state = self.state.write().map_err(poison_err)?;
        if !state.statistics.contains_key(&row.branch_statistic_id) {
            return Err(
                tally_core::Error::resource_not_found("branch statistic", row.branch_statistic_id)
                    .into(),
            );
        }
        let duplicate = state.text_unit_statistics.values().any(|existing| {
            existing.branch_statistic_id == row.branch_statistic_id
                && existing.text_unit_id == row.text_unit_id
        });
        if duplicate {
            return Err(Error::storage(format!(
                "unique constraint violated: text unit {} already tracked by statistic {}",
                row.text_unit_id, row.branch_statistic_id
            )));
        }

        let created = BranchTextUnitStatistic {
            id: BranchTextUnitStatisticId::new(state.next_id()),
            branch_statistic_id: row.branch_statistic_id,
            text_unit_id: row.text_unit_id,
            total_count: row.counts.total,
            for_translation_count: row.counts.for_translation,
        };
        state.text_unit_statistics.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save_text_unit_statistic(&self, row: &BranchTextUnitStatistic) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let Some(stored) = state.text_unit_statistics.get_mut(&row.id) else {
            return Err(
                tally_core::Error::resource_not_found("branch text unit statistic", row.id).into(),
            );
        };
        *stored = row.clone();
        Ok(())
    }

    async fn delete_by_branch_and_text_unit_ids_in(
        &self,
        branch_id: BranchId,
        text_unit_ids: &HashSet<TextUnitId>,
    ) -> Result<u64> {
        if text_unit_ids.is_empty() {
            return Ok(0);
        }

        let mut state = self.state.write().map_err(poison_err)?;
        let Some(statistic_id) = state.statistic_of(branch_id).map(|s| s.id) else {
            return Ok(0);
        };

        let before = state.text_unit_statistics.len();
        state.text_unit_statistics.retain(|_, row| {
            !(row.branch_statistic_id == statistic_id && text_unit_ids.contains(&row.text_unit_id))
        });
        let removed = before - state.text_unit_statistics.len();
        drop(state);

        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl TextUnitMapping for InMemoryStore {
    async fn find_text_unit_ids_by_branch(&self, branch_id: BranchId) -> Result<Vec<TextUnitId>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.mappings.get(&branch_id).cloned().unwrap_or_default())
    }
}
