//! Branch notification follow-up jobs.
//!
//! After a branch's statistics change, a notification job re-evaluates whether
//! the branch owners should hear about it. The job is keyed by branch id, so a
//! branch reconciled several times before the job runs notifies once.

use serde::{Deserialize, Serialize};

use tally_core::BranchId;

use crate::error::Result;
use crate::jobs::{DedupJobScheduler, ScheduleOutcome};

/// Job type of the branch notification follow-up.
pub const BRANCH_NOTIFICATION_JOB: &str = "BranchNotificationJob";

/// Input of a [`BRANCH_NOTIFICATION_JOB`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchNotificationJobInput {
    /// Branch whose statistics changed.
    pub branch_id: BranchId,
}

/// Schedules the notification job of a branch.
///
/// # Errors
///
/// Returns an error if the backing scheduler fails.
pub async fn schedule_branch_notification(
    jobs: &DedupJobScheduler,
    branch_id: BranchId,
) -> Result<ScheduleOutcome> {
    jobs.schedule(
        BRANCH_NOTIFICATION_JOB,
        &branch_id.to_string(),
        &BranchNotificationJobInput { branch_id },
    )
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::jobs::job_key;
    use crate::scheduler::memory::InMemoryScheduler;

    #[test]
    fn input_serializes_branch_id() {
        let input = BranchNotificationJobInput {
            branch_id: BranchId::new(42),
        };
        assert_eq!(
            serde_json::to_value(input).unwrap(),
            serde_json::json!({"branchId": 42})
        );
    }

    #[tokio::test]
    async fn notification_is_keyed_by_branch() {
        let backing = Arc::new(InMemoryScheduler::new());
        let jobs = DedupJobScheduler::new(backing.clone());

        schedule_branch_notification(&jobs, BranchId::new(42)).await.unwrap();
        let again = schedule_branch_notification(&jobs, BranchId::new(42)).await.unwrap();
        schedule_branch_notification(&jobs, BranchId::new(43)).await.unwrap();

        assert!(again.is_replaced());
        assert_eq!(again.key(), &job_key(BRANCH_NOTIFICATION_JOB, "42"));
        assert_eq!(backing.pending_count().unwrap(), 2);
    }
}
