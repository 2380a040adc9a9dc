//! Per-branch mutual exclusion for statistics reconciliation.
//!
//! Reconciling the same branch twice concurrently would race on
//! "load or create" of its [`crate::model::BranchStatistic`]. [`BranchLocks`]
//! hands out one async mutex per branch: reconciliations of one branch queue up
//! behind each other while different branches proceed in parallel.
//!
//! Entries are removed once the last holder or waiter is gone, so the map only
//! ever contains branches that are being reconciled right now.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use tally_core::BranchId;

use crate::error::{Error, Result};

type LockMap = HashMap<BranchId, Arc<AsyncMutex<()>>>;

/// Keyed async mutex, one key per branch.
#[derive(Debug, Clone, Default)]
pub struct BranchLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("branch lock table poisoned")
}

impl BranchLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the branch is free and locks it.
    ///
    /// The lock is released when the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock table is poisoned.
    pub async fn lock(&self, branch_id: BranchId) -> Result<BranchGuard> {
        let mutex = {
            let mut locks = self.locks.lock().map_err(poison_err)?;
            Arc::clone(locks.entry(branch_id).or_default())
        };
        let guard = mutex.lock_owned().await;
        Ok(BranchGuard {
            branch_id,
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        })
    }

    /// Returns the number of branches currently locked or awaited.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock table is poisoned.
    pub fn active(&self) -> Result<usize> {
        Ok(self.locks.lock().map_err(poison_err)?.len())
    }
}

/// Holds the reconciliation lock of one branch.
#[derive(Debug)]
pub struct BranchGuard {
    branch_id: BranchId,
    locks: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl BranchGuard {
    /// Returns the locked branch.
    #[must_use]
    pub const fn branch_id(&self) -> BranchId {
        self.branch_id
    }
}

impl Drop for BranchGuard {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        // A poisoned table only leaks the entry; the mutex itself is released below.
        if let Ok(mut locks) = self.locks.lock() {
            let mutex = OwnedMutexGuard::mutex(&guard);
            // One reference from the table, one from this guard: nobody is waiting.
            if Arc::strong_count(mutex) <= 2 {
                locks.remove(&self.branch_id);
            }
        }
        drop(guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_branch_is_serialized() {
        let locks = BranchLocks::new();
        let first = locks.lock(BranchId::new(1)).await.unwrap();

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.lock(BranchId::new(1)).await.map(|g| g.branch_id()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        let acquired = contender.await.unwrap().unwrap();
        assert_eq!(acquired, BranchId::new(1));
    }

    #[tokio::test]
    async fn different_branches_do_not_block() {
        let locks = BranchLocks::new();
        let _first = locks.lock(BranchId::new(1)).await.unwrap();

        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock(BranchId::new(2)))
            .await
            .expect("different branch should lock immediately")
            .unwrap();

        assert_eq!(second.branch_id(), BranchId::new(2));
        assert_eq!(locks.active().unwrap(), 2);
    }

    #[tokio::test]
    async fn released_entries_are_removed() {
        let locks = BranchLocks::new();
        {
            let _guard = locks.lock(BranchId::new(1)).await.unwrap();
            assert_eq!(locks.active().unwrap(), 1);
        }
        assert_eq!(locks.active().unwrap(), 0);
    }
}
