//! Test scheduler with operation tracing.
//!
//! Wraps [`InMemoryScheduler`] and records every call, so tests can assert on
//! the order of startup operations, and fails chosen operations on demand.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tally_flow::error::{Error, Result};
use tally_flow::scheduler::memory::InMemoryScheduler;
use tally_flow::scheduler::{
    JobDefinition, JobKey, PendingJob, Scheduler, TriggerDefinition, TriggerKey, UpsertOutcome,
};

/// Record of a scheduler operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerOp {
    /// Job keys were read.
    JobKeys {
        /// Group that was read.
        group: String,
    },
    /// Trigger keys were read.
    TriggerKeys {
        /// Group that was read.
        group: String,
    },
    /// Triggers were unscheduled.
    UnscheduleJobs {
        /// Unscheduled triggers.
        keys: Vec<TriggerKey>,
    },
    /// Jobs were deleted.
    DeleteJobs {
        /// Deleted jobs.
        keys: Vec<JobKey>,
    },
    /// A job was registered.
    AddJob {
        /// Registered job.
        key: JobKey,
        /// Overwrite flag.
        replace: bool,
    },
    /// A trigger was registered.
    ScheduleTrigger {
        /// Registered trigger.
        key: TriggerKey,
        /// Overwrite flag.
        replace: bool,
    },
    /// A pending job was upserted.
    UpsertPending {
        /// Pending job key.
        key: JobKey,
    },
    /// The scheduler was started.
    StartDelayed {
        /// Start delay.
        delay: Duration,
    },
}

impl SchedulerOp {
    /// Returns the failure-injection kind of this operation.
    pub fn kind(&self) -> OpKind {
        match self {
            Self::JobKeys { .. } => OpKind::JobKeys,
            Self::TriggerKeys { .. } => OpKind::TriggerKeys,
            Self::UnscheduleJobs { .. } => OpKind::UnscheduleJobs,
            Self::DeleteJobs { .. } => OpKind::DeleteJobs,
            Self::AddJob { .. } => OpKind::AddJob,
            Self::ScheduleTrigger { .. } => OpKind::ScheduleTrigger,
            Self::UpsertPending { .. } => OpKind::UpsertPending,
            Self::StartDelayed { .. } => OpKind::StartDelayed,
        }
    }
}

/// Operation kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// [`Scheduler::job_keys`].
    JobKeys,
    /// [`Scheduler::trigger_keys`].
    TriggerKeys,
    /// [`Scheduler::unschedule_jobs`].
    UnscheduleJobs,
    /// [`Scheduler::delete_jobs`].
    DeleteJobs,
    /// [`Scheduler::add_job`].
    AddJob,
    /// [`Scheduler::schedule_trigger`].
    ScheduleTrigger,
    /// [`Scheduler::upsert_pending`].
    UpsertPending,
    /// [`Scheduler::start_delayed`].
    StartDelayed,
}

/// In-memory scheduler with operation tracing.
#[derive(Debug, Clone, Default)]
pub struct TracingScheduler {
    inner: Arc<InMemoryScheduler>,
    operations: Arc<Mutex<Vec<SchedulerOp>>>,
    fail_ops: Arc<Mutex<HashSet<OpKind>>>,
}

impl TracingScheduler {
    /// Creates a new empty tracing scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped scheduler for state inspection.
    pub fn inner(&self) -> &InMemoryScheduler {
        &self.inner
    }

    /// Returns all recorded operations.
    pub fn operations(&self) -> Vec<SchedulerOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Makes every future call of the given kind fail.
    pub fn inject_failure(&self, kind: OpKind) {
        self.fail_ops.lock().expect("lock").insert(kind);
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.fail_ops.lock().expect("lock").clear();
    }

    /// Returns the position of the first recorded operation of a kind.
    pub fn position(&self, kind: OpKind) -> Option<usize> {
        self.operations().iter().position(|op| op.kind() == kind)
    }

    fn record(&self, op: SchedulerOp) -> Result<()> {
        let kind = op.kind();
        self.operations.lock().expect("lock").push(op);
        if self.fail_ops.lock().expect("lock").contains(&kind) {
            return Err(Error::scheduler(format!("injected failure for {kind:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Scheduler for TracingScheduler {
    async fn job_keys(&self, group: &str) -> Result<HashSet<JobKey>> {
        self.record(SchedulerOp::JobKeys {
            group: group.to_string(),
        })?;
        self.inner.job_keys(group).await
    }

    async fn trigger_keys(&self, group: &str) -> Result<HashSet<TriggerKey>> {
        self.record(SchedulerOp::TriggerKeys {
            group: group.to_string(),
        })?;
        self.inner.trigger_keys(group).await
    }

    async fn unschedule_jobs(&self, keys: &[TriggerKey]) -> Result<bool> {
        self.record(SchedulerOp::UnscheduleJobs {
            keys: keys.to_vec(),
        })?;
        self.inner.unschedule_jobs(keys).await
    }

    async fn delete_jobs(&self, keys: &[JobKey]) -> Result<bool> {
        self.record(SchedulerOp::DeleteJobs {
            keys: keys.to_vec(),
        })?;
        self.inner.delete_jobs(keys).await
    }

    async fn add_job(&self, job: &JobDefinition, replace: bool) -> Result<()> {
        self.record(SchedulerOp::AddJob {
            key: job.key.clone(),
            replace,
        })?;
        self.inner.add_job(job, replace).await
    }

    async fn schedule_trigger(&self, trigger: &TriggerDefinition, replace: bool) -> Result<()> {
        self.record(SchedulerOp::ScheduleTrigger {
            key: trigger.key.clone(),
            replace,
        })?;
        self.inner.schedule_trigger(trigger, replace).await
    }

    async fn upsert_pending(&self, job: PendingJob) -> Result<UpsertOutcome> {
        self.record(SchedulerOp::UpsertPending {
            key: job.key.clone(),
        })?;
        self.inner.upsert_pending(job).await
    }

    async fn start_delayed(&self, delay: Duration) -> Result<()> {
        self.record(SchedulerOp::StartDelayed { delay })?;
        self.inner.start_delayed(delay).await
    }

    async fn is_started(&self) -> Result<bool> {
        self.inner.is_started().await
    }
}
