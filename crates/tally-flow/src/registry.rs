//! Startup reconciliation of the scheduler's job and trigger registry.
//!
//! The scheduler persists its registry across restarts. Jobs and triggers that
//! an earlier release declared but this one no longer does would keep firing
//! against code that is gone, so startup removes them before anything fires:
//!
//! ```text
//! read live keys (DEFAULT group)
//!   -> unschedule stale triggers
//!   -> delete stale jobs
//!   -> ReconciledRegistry
//!        -> register declared jobs/triggers (overwrite)
//!        -> start_delayed
//! ```
//!
//! [`ReconciledRegistry`] can only be obtained from a completed cleanup, and it
//! is the only way to start the scheduler. Every failure is fatal and surfaces
//! as [`Error::StartupCleanup`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, Instrument};

use tally_core::observability::scheduler_span;
use tally_core::KeyDiff;

use crate::config::ReconcileConfig;
use crate::error::{Error, Result, StartupPhase};
use crate::metrics::ReconcileMetrics;
use crate::scheduler::{
    JobDefinition, JobKey, Scheduler, TriggerDefinition, TriggerKey, DEFAULT_GROUP,
};

/// The statically declared jobs and triggers of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRegistry {
    jobs: Vec<JobDefinition>,
    triggers: Vec<TriggerDefinition>,
}

impl JobRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is declared twice, a definition leaves the
    /// default group, or a trigger targets an undeclared job.
    pub fn from_definitions(
        jobs: impl IntoIterator<Item = JobDefinition>,
        triggers: impl IntoIterator<Item = TriggerDefinition>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for job in jobs {
            registry = registry.with_job(job)?;
        }
        for trigger in triggers {
            registry = registry.with_trigger(trigger)?;
        }
        Ok(registry)
    }

    /// Declares a job.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is already declared or outside the default group.
    pub fn with_job(mut self, job: JobDefinition) -> Result<Self> {
        if job.key.group != DEFAULT_GROUP {
            return Err(Error::invalid_definition(format!(
                "declared job {} must be in group {DEFAULT_GROUP}",
                job.key
            )));
        }
        if self.jobs.iter().any(|j| j.key == job.key) {
            return Err(Error::invalid_definition(format!(
                "job {} declared twice",
                job.key
            )));
        }
        self.jobs.push(job);
        Ok(self)
    }

    /// Declares a trigger for an already declared job.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is already declared, outside the default
    /// group, or the target job is not declared.
    pub fn with_trigger(mut self, trigger: TriggerDefinition) -> Result<Self> {
        if trigger.key.group != DEFAULT_GROUP {
            return Err(Error::invalid_definition(format!(
                "declared trigger {} must be in group {DEFAULT_GROUP}",
                trigger.key
            )));
        }
        if self.triggers.iter().any(|t| t.key == trigger.key) {
            return Err(Error::invalid_definition(format!(
                "trigger {} declared twice",
                trigger.key
            )));
        }
        if !self.jobs.iter().any(|j| j.key == trigger.job_key) {
            return Err(Error::invalid_definition(format!(
                "trigger {} targets undeclared job {}",
                trigger.key, trigger.job_key
            )));
        }
        self.triggers.push(trigger);
        Ok(self)
    }

    /// Returns the declared jobs.
    #[must_use]
    pub fn jobs(&self) -> &[JobDefinition] {
        &self.jobs
    }

    /// Returns the declared triggers.
    #[must_use]
    pub fn triggers(&self) -> &[TriggerDefinition] {
        &self.triggers
    }

    /// Returns the declared job keys.
    #[must_use]
    pub fn job_keys(&self) -> HashSet<JobKey> {
        self.jobs.iter().map(|j| j.key.clone()).collect()
    }

    /// Returns the declared trigger keys.
    #[must_use]
    pub fn trigger_keys(&self) -> HashSet<TriggerKey> {
        self.triggers.iter().map(|t| t.key.clone()).collect()
    }
}

/// What startup cleanup removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCleanup {
    /// Unscheduled triggers, sorted.
    pub stale_triggers: Vec<TriggerKey>,
    /// Deleted jobs, sorted.
    pub stale_jobs: Vec<JobKey>,
}

impl RegistryCleanup {
    /// Returns true if the live registry already matched the declared one.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.stale_triggers.is_empty() && self.stale_jobs.is_empty()
    }
}

/// Outcome of a completed startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupReport {
    /// Stale keys removed before starting.
    pub cleanup: RegistryCleanup,
    /// Number of declared jobs registered.
    pub registered_jobs: usize,
    /// Number of declared triggers registered.
    pub registered_triggers: usize,
    /// Delay before the first firing.
    pub start_delay: Duration,
}

/// Removes stale jobs and triggers from the scheduler's default group.
pub struct RegistryReconciler {
    scheduler: Arc<dyn Scheduler>,
    registry: JobRegistry,
    metrics: ReconcileMetrics,
}

impl std::fmt::Debug for RegistryReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryReconciler")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl RegistryReconciler {
    /// Creates a reconciler for the declared registry.
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>, registry: JobRegistry) -> Self {
        Self {
            scheduler,
            registry,
            metrics: ReconcileMetrics::new(),
        }
    }

    /// Unschedules stale triggers, then deletes stale jobs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StartupCleanup`] naming the failed phase. The scheduler
    /// must not be started after an error.
    pub async fn reconcile(self) -> Result<ReconciledRegistry> {
        let span = scheduler_span("reconcile_registry", DEFAULT_GROUP);
        async move {
            let cleanup = match self.cleanup().await {
                Ok(cleanup) => cleanup,
                Err(e) => {
                    error!(error = %e, "scheduler registry cleanup failed");
                    return Err(e);
                }
            };
            info!(
                stale_triggers = cleanup.stale_triggers.len(),
                stale_jobs = cleanup.stale_jobs.len(),
                "scheduler registry reconciled"
            );
            Ok(ReconciledRegistry {
                scheduler: self.scheduler,
                registry: self.registry,
                cleanup,
            })
        }
        .instrument(span)
        .await
    }

    async fn cleanup(&self) -> Result<RegistryCleanup> {
        let live_jobs = self
            .scheduler
            .job_keys(DEFAULT_GROUP)
            .await
            .map_err(|e| Error::startup(StartupPhase::ReadLiveKeys, e))?;
        let live_triggers = self
            .scheduler
            .trigger_keys(DEFAULT_GROUP)
            .await
            .map_err(|e| Error::startup(StartupPhase::ReadLiveKeys, e))?;

        let trigger_diff = KeyDiff::compute(&self.registry.trigger_keys(), &live_triggers);
        let job_diff = KeyDiff::compute(&self.registry.job_keys(), &live_jobs);

        let mut stale_triggers: Vec<_> = trigger_diff.stale.into_iter().collect();
        stale_triggers.sort();
        let mut stale_jobs: Vec<_> = job_diff.stale.into_iter().collect();
        stale_jobs.sort();

        if !stale_triggers.is_empty() {
            info!(triggers = ?stale_triggers, "unscheduling stale triggers");
            self.scheduler
                .unschedule_jobs(&stale_triggers)
                .await
                .map_err(|e| Error::startup(StartupPhase::UnscheduleTriggers, e))?;
            self.metrics.record_stale_keys("trigger", stale_triggers.len());
        }

        if !stale_jobs.is_empty() {
            info!(jobs = ?stale_jobs, "deleting stale jobs");
            self.scheduler
                .delete_jobs(&stale_jobs)
                .await
                .map_err(|e| Error::startup(StartupPhase::DeleteJobs, e))?;
            self.metrics.record_stale_keys("job", stale_jobs.len());
        }

        Ok(RegistryCleanup {
            stale_triggers,
            stale_jobs,
        })
    }
}

/// A registry whose stale keys were removed; the only value that can start the scheduler.
#[must_use = "the scheduler does not fire until the reconciled registry is started"]
pub struct ReconciledRegistry {
    scheduler: Arc<dyn Scheduler>,
    registry: JobRegistry,
    cleanup: RegistryCleanup,
}

impl std::fmt::Debug for ReconciledRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciledRegistry")
            .field("cleanup", &self.cleanup)
            .finish_non_exhaustive()
    }
}

impl ReconciledRegistry {
    /// Returns what the cleanup removed.
    #[must_use]
    pub const fn cleanup(&self) -> &RegistryCleanup {
        &self.cleanup
    }

    /// Registers the declared jobs and triggers, then starts the scheduler after `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StartupCleanup`] naming the failed phase.
    pub async fn start(self, delay: Duration) -> Result<StartupReport> {
        let span = scheduler_span("start", DEFAULT_GROUP);
        async move {
            if let Err(e) = self.launch(delay).await {
                error!(error = %e, "scheduler start failed");
                return Err(e);
            }

            info!(
                jobs = self.registry.jobs().len(),
                triggers = self.registry.triggers().len(),
                delay_secs = delay.as_secs(),
                "scheduler started"
            );
            Ok(StartupReport {
                registered_jobs: self.registry.jobs().len(),
                registered_triggers: self.registry.triggers().len(),
                cleanup: self.cleanup,
                start_delay: delay,
            })
        }
        .instrument(span)
        .await
    }

    async fn launch(&self, delay: Duration) -> Result<()> {
        self.register_declared()
            .await
            .map_err(|e| Error::startup(StartupPhase::RegisterDeclared, e))?;
        self.scheduler
            .start_delayed(delay)
            .await
            .map_err(|e| Error::startup(StartupPhase::Start, e))
    }

    async fn register_declared(&self) -> Result<()> {
        for job in self.registry.jobs() {
            self.scheduler.add_job(job, true).await?;
        }
        for trigger in self.registry.triggers() {
            self.scheduler.schedule_trigger(trigger, true).await?;
        }
        Ok(())
    }
}

/// Reconciles the registry and starts the scheduler with the configured delay.
///
/// # Errors
///
/// Returns [`Error::StartupCleanup`]; the caller should abort process startup.
pub async fn start_scheduler(
    scheduler: Arc<dyn Scheduler>,
    registry: JobRegistry,
    config: &ReconcileConfig,
) -> Result<StartupReport> {
    RegistryReconciler::new(scheduler, registry)
        .reconcile()
        .await?
        .start(config.scheduler_start_delay)
        .await
}
