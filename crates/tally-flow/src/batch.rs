//! Repository-wide statistics batch.
//!
//! [`BranchBatchDriver::reconcile_all`] reconciles every processable branch of
//! a repository and schedules one notification follow-up per reconciled
//! branch. Branches are independent: up to
//! [`ReconcileConfig::branch_concurrency`] run at once, and a failing branch
//! is logged and skipped while the others carry on. The next batch retries it.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use tally_core::{BranchId, RepositoryId};

use crate::config::ReconcileConfig;
use crate::error::Result;
use crate::jobs::DedupJobScheduler;
use crate::model::Branch;
use crate::notification::schedule_branch_notification;
use crate::statistics::StatisticsReconciler;

/// A branch whose reconciliation or notification failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchFailure {
    /// The failed branch.
    pub branch_id: BranchId,
    /// Rendered error.
    pub message: String,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Branches whose statistics were reconciled and notification scheduled.
    pub reconciled: Vec<BranchId>,
    /// Branches that failed and will be retried by the next batch.
    pub failed: Vec<BranchFailure>,
}

impl BatchReport {
    /// Returns true if every selected branch succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives statistics reconciliation over all branches of a repository.
#[derive(Debug, Clone)]
pub struct BranchBatchDriver {
    reconciler: StatisticsReconciler,
    jobs: DedupJobScheduler,
    config: ReconcileConfig,
}

impl BranchBatchDriver {
    /// Creates a driver.
    #[must_use]
    pub const fn new(
        reconciler: StatisticsReconciler,
        jobs: DedupJobScheduler,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            reconciler,
            jobs,
            config,
        }
    }

    /// Reconciles every processable branch of a repository.
    ///
    /// # Errors
    ///
    /// Returns an error only if the branches cannot be listed. Per-branch
    /// failures are reported in the [`BatchReport`].
    pub async fn reconcile_all(&self, repository_id: RepositoryId) -> Result<BatchReport> {
        let branches = self
            .reconciler
            .context()
            .branches
            .find_processable(repository_id, &self.config.primary_branch_name)
            .await?;
        // Stores may be lax about the primary name.
        let branches: Vec<Branch> = branches
            .into_iter()
            .filter(|branch| branch.is_processable(&self.config.primary_branch_name))
            .collect();

        info!(
            repository_id = %repository_id,
            branches = branches.len(),
            concurrency = self.config.branch_concurrency,
            "starting branch statistics batch"
        );

        let results: Vec<(BranchId, Result<()>)> = stream::iter(branches)
            .map(|branch| async move {
                let result = self.process_branch(&branch).await;
                (branch.id, result)
            })
            .buffer_unordered(self.config.branch_concurrency.max(1))
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (branch_id, result) in results {
            match result {
                Ok(()) => report.reconciled.push(branch_id),
                Err(error) => {
                    warn!(
                        repository_id = %repository_id,
                        branch_id = %branch_id,
                        error = %error,
                        "branch statistics reconciliation failed, continuing"
                    );
                    report.failed.push(BranchFailure {
                        branch_id,
                        message: error.to_string(),
                    });
                }
            }
        }
        report.reconciled.sort_unstable();
        report.failed.sort_by_key(|failure| failure.branch_id);

        info!(
            repository_id = %repository_id,
            reconciled = report.reconciled.len(),
            failed = report.failed.len(),
            "finished branch statistics batch"
        );
        Ok(report)
    }

    async fn process_branch(&self, branch: &Branch) -> Result<()> {
        self.reconciler.reconcile(branch).await?;
        schedule_branch_notification(&self.jobs, branch.id).await?;
        Ok(())
    }
}
