//! # tally-flow
//!
//! Reconciliation engine for branch translation statistics and the job
//! scheduler that follows up on them.
//!
//! This crate provides:
//!
//! - **Statistics Reconciler**: Recomputes the cached statistics of one branch
//!   from the authoritative text units, dropping rows of units that left it
//! - **Branch Batch Driver**: Reconciles every processable branch of a
//!   repository and schedules a notification per branch
//! - **Registry Reconciler**: Removes stale jobs and triggers from the scheduler
//!   before it is allowed to start
//! - **Deduplicating Job Scheduler**: At most one pending job per
//!   `(job type, unique id)`, carrying the latest input
//!
//! ## Guarantees
//!
//! - **Idempotent**: Re-running a reconciliation with unchanged inputs changes nothing
//! - **Exact**: After a run, a branch has one row per authoritative text unit, no more
//! - **Ordered startup**: The scheduler cannot start before stale keys are gone
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tally_flow::config::ReconcileConfig;
//! use tally_flow::error::Result;
//! use tally_flow::registry::{start_scheduler, JobRegistry};
//! use tally_flow::scheduler::memory::InMemoryScheduler;
//! use tally_flow::scheduler::{JobDefinition, JobKey, TriggerDefinition};
//!
//! # async fn run() -> Result<()> {
//! let config = ReconcileConfig::from_env()?;
//! config.init_logging();
//!
//! let registry = JobRegistry::new()
//!     .with_job(JobDefinition::new("branch-statistics", "BranchStatisticsJob"))?
//!     .with_trigger(TriggerDefinition::cron(
//!         "branch-statistics-every-5m",
//!         JobKey::in_default_group("branch-statistics"),
//!         "0 */5 * * * *",
//!     )?)?;
//!
//! let scheduler = Arc::new(InMemoryScheduler::new());
//! let report = start_scheduler(scheduler, registry, &config).await?;
//! assert!(report.cleanup.is_noop());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod batch;
pub mod config;
pub mod error;
pub mod jobs;
pub mod lock;
pub mod metrics;
pub mod model;
pub mod notification;
pub mod registry;
pub mod scheduler;
pub mod search;
pub mod statistics;
pub mod store;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::batch::{BatchReport, BranchBatchDriver};
    pub use crate::config::ReconcileConfig;
    pub use crate::error::{Error, Result, StartupPhase};
    pub use crate::jobs::{DedupJobScheduler, JobRequest, ScheduleOutcome};
    pub use crate::metrics::ReconcileMetrics;
    pub use crate::model::{Branch, BranchStatistic, BranchTextUnitStatistic};
    pub use crate::notification::{BranchNotificationJobInput, BRANCH_NOTIFICATION_JOB};
    pub use crate::registry::{
        start_scheduler, JobRegistry, ReconciledRegistry, RegistryReconciler, StartupReport,
    };
    pub use crate::scheduler::{JobDefinition, JobKey, Scheduler, TriggerDefinition, TriggerKey};
    pub use crate::search::{SearchParameters, StatusFilter, TextUnitSearcher};
    pub use crate::statistics::{StatisticsContext, StatisticsReconciler};
    pub use crate::store::{
        BranchStatisticStore, BranchStore, BranchTextUnitStatisticStore, TextUnitMapping,
    };
}
