//! In-memory scheduler implementation for testing.
//!
//! This module provides [`InMemoryScheduler`], a simple in-memory implementation
//! of the [`Scheduler`] trait suitable for testing and development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No persistence, no firing
//! - **Single-process only**: The registry is not visible across process boundaries
//! - **Workers poll explicitly**: [`InMemoryScheduler::take_pending`] stands in for a worker pickup

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    JobDefinition, JobKey, PendingJob, Scheduler, TriggerDefinition, TriggerKey, UpsertOutcome,
};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct SchedulerState {
    jobs: HashMap<JobKey, JobDefinition>,
    triggers: HashMap<TriggerKey, TriggerDefinition>,
    pending: BTreeMap<JobKey, PendingJob>,
    starts_at: Option<DateTime<Utc>>,
}

/// In-memory scheduler for testing.
///
/// All registry state sits behind one `RwLock`, which makes
/// [`Scheduler::upsert_pending`] atomic per key.
///
/// ## Example
///
/// ```rust
/// use tally_flow::scheduler::memory::InMemoryScheduler;
///
/// let scheduler = InMemoryScheduler::new();
/// // Reconcile the registry, then start it...
/// ```
#[derive(Debug, Default)]
pub struct InMemoryScheduler {
    state: RwLock<SchedulerState>,
}

/// Converts a lock poison error to a scheduler error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::scheduler("scheduler lock poisoned")
}

impl InMemoryScheduler {
    /// Creates an empty, stopped scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pending job with the given key.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn pending(&self, key: &JobKey) -> Result<Option<PendingJob>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.pending.get(key).cloned())
    }

    /// Returns the number of pending jobs.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.state.read().map_err(poison_err)?.pending.len())
    }

    /// Hands every pending job to a worker, ordered by fire time.
    ///
    /// Once taken, a key can be scheduled again.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn take_pending(&self) -> Result<Vec<PendingJob>> {
        let mut state = self.state.write().map_err(poison_err)?;
        let mut taken: Vec<_> = std::mem::take(&mut state.pending).into_values().collect();
        drop(state);
        taken.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.key.cmp(&b.key)));
        Ok(taken)
    }

    /// Returns a registered job definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn job(&self, key: &JobKey) -> Result<Option<JobDefinition>> {
        Ok(self.state.read().map_err(poison_err)?.jobs.get(key).cloned())
    }

    /// Returns a registered trigger definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn trigger(&self, key: &TriggerKey) -> Result<Option<TriggerDefinition>> {
        Ok(self.state.read().map_err(poison_err)?.triggers.get(key).cloned())
    }

    /// Returns when firing begins, if the scheduler was started.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn starts_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state.read().map_err(poison_err)?.starts_at)
    }
}

#[async_trait]
impl Scheduler for InMemoryScheduler {
    async fn job_keys(&self, group: &str) -> Result<HashSet<JobKey>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .jobs
            .keys()
            .chain(state.pending.keys())
            .filter(|key| key.group == group)
            .cloned()
            .collect())
    }

    async fn trigger_keys(&self, group: &str) -> Result<HashSet<TriggerKey>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .triggers
            .keys()
            .filter(|key| key.group == group)
            .cloned()
            .collect())
    }

    async fn unschedule_jobs(&self, keys: &[TriggerKey]) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;
        let mut all_found = true;
        for key in keys {
            all_found &= state.triggers.remove(key).is_some();
        }
        Ok(all_found)
    }

    async fn delete_jobs(&self, keys: &[JobKey]) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;
        let mut all_found = true;
        for key in keys {
            let registered = state.jobs.remove(key).is_some();
            let pending = state.pending.remove(key).is_some();
            state.triggers.retain(|_, trigger| &trigger.job_key != key);
            all_found &= registered || pending;
        }
        Ok(all_found)
    }

    async fn add_job(&self, job: &JobDefinition, replace: bool) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        if !replace && state.jobs.contains_key(&job.key) {
            return Err(Error::scheduler(format!("job {} already exists", job.key)));
        }
        state.jobs.insert(job.key.clone(), job.clone());
        Ok(())
    }

    async fn schedule_trigger(&self, trigger: &TriggerDefinition, replace: bool) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        if !state.jobs.contains_key(&trigger.job_key) {
            return Err(Error::scheduler(format!(
                "trigger {} references unknown job {}",
                trigger.key, trigger.job_key
            )));
        }
        if !replace && state.triggers.contains_key(&trigger.key) {
            return Err(Error::scheduler(format!(
                "trigger {} already exists",
                trigger.key
            )));
        }
        state.triggers.insert(trigger.key.clone(), trigger.clone());
        Ok(())
    }

    async fn upsert_pending(&self, job: PendingJob) -> Result<UpsertOutcome> {
        let mut state = self.state.write().map_err(poison_err)?;
        let outcome = match state.pending.insert(job.key.clone(), job) {
            Some(previous) => UpsertOutcome::Replaced {
                previous: Box::new(previous),
            },
            None => UpsertOutcome::Inserted,
        };
        Ok(outcome)
    }

    async fn start_delayed(&self, delay: Duration) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        if state.starts_at.is_some() {
            return Err(Error::scheduler("scheduler already started"));
        }
        let delay = chrono::Duration::from_std(delay)
            .map_err(|_| Error::scheduler(format!("start delay {delay:?} out of range")))?;
        state.starts_at = Some(Utc::now() + delay);
        Ok(())
    }

    async fn is_started(&self) -> Result<bool> {
        Ok(self.state.read().map_err(poison_err)?.starts_at.is_some())
    }
}
