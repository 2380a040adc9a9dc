//! Job scheduler abstraction.
//!
//! This module provides:
//!
//! - [`JobKey`] / [`TriggerKey`]: `(name, group)` identities of jobs and their firing rules
//! - [`JobDefinition`] / [`TriggerDefinition`]: statically declared jobs and triggers
//! - [`PendingJob`]: a one-shot job waiting to be picked up by a worker
//! - [`Scheduler`]: the operations the reconciliation core needs from a scheduler runtime
//! - [`memory::InMemoryScheduler`]: in-memory scheduler for testing
//!
//! ## Groups
//!
//! Declared definitions live in [`DEFAULT_GROUP`], the only group reconciled at
//! startup. On-demand deduplicated jobs live in [`DYNAMIC_GROUP`] so that startup
//! cleanup never discards pending follow-up work.

pub mod memory;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Group of statically declared jobs and triggers.
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Group of on-demand deduplicated jobs.
pub const DYNAMIC_GROUP: &str = "DYNAMIC";

/// Identity of a job within a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    /// Job name, unique within the group.
    pub name: String,
    /// Group name.
    pub group: String,
}

impl JobKey {
    /// Creates a key in the given group.
    #[must_use]
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// Creates a key in [`DEFAULT_GROUP`].
    #[must_use]
    pub fn in_default_group(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GROUP)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Identity of a trigger within a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerKey {
    /// Trigger name, unique within the group.
    pub name: String,
    /// Group name.
    pub group: String,
}

impl TriggerKey {
    /// Creates a key in the given group.
    #[must_use]
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// Creates a key in [`DEFAULT_GROUP`].
    #[must_use]
    pub fn in_default_group(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GROUP)
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// A statically declared job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefinition {
    /// Job identity.
    pub key: JobKey,
    /// Type of work the job runs.
    pub job_type: String,
    /// Human readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the job stays registered without any trigger.
    pub durable: bool,
}

impl JobDefinition {
    /// Declares a durable job in [`DEFAULT_GROUP`].
    #[must_use]
    pub fn new(name: impl Into<String>, job_type: impl Into<String>) -> Self {
        Self {
            key: JobKey::in_default_group(name),
            job_type: job_type.into(),
            description: None,
            durable: true,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Firing rule of a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSchedule {
    /// Cron expression with a seconds field.
    Cron {
        /// The expression, e.g. `0 */5 * * * *`.
        expression: String,
    },
    /// Fixed interval.
    Interval {
        /// Seconds between firings.
        every_secs: u64,
    },
}

/// A statically declared trigger bound to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDefinition {
    /// Trigger identity.
    pub key: TriggerKey,
    /// Job fired by this trigger.
    pub job_key: JobKey,
    /// Firing rule.
    pub schedule: TriggerSchedule,
}

impl TriggerDefinition {
    /// Declares a cron trigger in [`DEFAULT_GROUP`].
    ///
    /// # Errors
    ///
    /// Returns an error if the cron expression does not parse.
    pub fn cron(
        name: impl Into<String>,
        job_key: JobKey,
        expression: impl Into<String>,
    ) -> Result<Self> {
        let expression = expression.into();
        cron::Schedule::from_str(&expression).map_err(|e| {
            Error::invalid_definition(format!("invalid cron expression '{expression}': {e}"))
        })?;
        Ok(Self {
            key: TriggerKey::in_default_group(name),
            job_key,
            schedule: TriggerSchedule::Cron { expression },
        })
    }

    /// Declares a fixed-interval trigger in [`DEFAULT_GROUP`].
    ///
    /// # Errors
    ///
    /// Returns an error if the interval is shorter than one second.
    pub fn interval(name: impl Into<String>, job_key: JobKey, every: Duration) -> Result<Self> {
        let every_secs = every.as_secs();
        if every_secs == 0 {
            return Err(Error::invalid_definition(
                "trigger interval must be at least one second",
            ));
        }
        Ok(Self {
            key: TriggerKey::in_default_group(name),
            job_key,
            schedule: TriggerSchedule::Interval { every_secs },
        })
    }

    /// Returns the first firing strictly after `after`.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored cron expression does not parse.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        match &self.schedule {
            TriggerSchedule::Cron { expression } => {
                let schedule = cron::Schedule::from_str(expression).map_err(|e| {
                    Error::invalid_definition(format!(
                        "invalid cron expression '{expression}': {e}"
                    ))
                })?;
                Ok(schedule.after(&after).next())
            }
            TriggerSchedule::Interval { every_secs } => {
                let every = i64::try_from(*every_secs).map_err(|_| {
                    Error::invalid_definition(format!("interval {every_secs}s out of range"))
                })?;
                Ok(after.checked_add_signed(chrono::Duration::seconds(every)))
            }
        }
    }
}

/// A one-shot job waiting to be picked up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingJob {
    /// Scheduler-assigned entry id; changes when the entry is replaced.
    pub entry_id: String,
    /// Job identity; the deduplication key.
    pub key: JobKey,
    /// Type of work to run.
    pub job_type: String,
    /// Job input payload.
    pub input: serde_json::Value,
    /// Earliest time the job may run.
    pub fire_at: DateTime<Utc>,
    /// When the request was made.
    pub requested_at: DateTime<Utc>,
}

/// Result of an atomic "replace if exists, else insert".
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// No pending job had the key; a new one was inserted.
    Inserted,
    /// A pending job with the key was overwritten.
    Replaced {
        /// The overwritten entry.
        previous: Box<PendingJob>,
    },
}

impl UpsertOutcome {
    /// Returns true if an existing pending job was overwritten.
    #[must_use]
    pub const fn is_replaced(&self) -> bool {
        matches!(self, Self::Replaced { .. })
    }
}

/// Operations the reconciliation core needs from a scheduler runtime.
///
/// The scheduler owns its live registry; these calls are the only way the core
/// mutates it. Firing, cron evaluation and worker threads stay inside the
/// runtime.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Returns the keys of all jobs in a group, pending one-shot jobs included.
    async fn job_keys(&self, group: &str) -> Result<HashSet<JobKey>>;

    /// Returns the keys of all triggers in a group.
    async fn trigger_keys(&self, group: &str) -> Result<HashSet<TriggerKey>>;

    /// Removes triggers. Returns true if every trigger existed.
    async fn unschedule_jobs(&self, keys: &[TriggerKey]) -> Result<bool>;

    /// Removes jobs and any trigger still bound to them. Returns true if every job existed.
    async fn delete_jobs(&self, keys: &[JobKey]) -> Result<bool>;

    /// Registers a job; with `replace` an existing definition is overwritten.
    async fn add_job(&self, job: &JobDefinition, replace: bool) -> Result<()>;

    /// Registers a trigger for an existing job; with `replace` an existing trigger is overwritten.
    async fn schedule_trigger(&self, trigger: &TriggerDefinition, replace: bool) -> Result<()>;

    /// Atomically replaces the pending job with the same key, or inserts it.
    ///
    /// Concurrent calls for one key must leave exactly one pending job.
    async fn upsert_pending(&self, job: PendingJob) -> Result<UpsertOutcome>;

    /// Starts firing after `delay`.
    async fn start_delayed(&self, delay: Duration) -> Result<()>;

    /// Returns true once the scheduler was started.
    async fn is_started(&self) -> Result<bool>;
}
