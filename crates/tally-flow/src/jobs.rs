//! Deduplicated scheduling of follow-up jobs.
//!
//! A [`JobRequest`] names a job type, an input payload and an optional unique
//! id. The job key is `{job_type}_{unique_id}` in the dynamic group, and the
//! backing scheduler holds at most one pending job per key: scheduling the same
//! key again before a worker picked it up overwrites the pending input.
//!
//! `_` and `\` inside the job type are escaped with a backslash, so the first
//! unescaped `_` always separates the pair and distinct pairs never share a key.
//!
//! ```text
//! schedule("BranchNotificationJob", "42", v1)  -> Inserted
//! schedule("BranchNotificationJob", "42", v2)  -> Replaced   (one pending job, input v2)
//! worker picks up BranchNotificationJob_42
//! schedule("BranchNotificationJob", "42", v3)  -> Inserted
//! ```
//!
//! Requests without a unique id get a fresh ULID and are never deduplicated.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::metrics::ReconcileMetrics;
use crate::scheduler::{JobKey, PendingJob, Scheduler, UpsertOutcome, DYNAMIC_GROUP};

/// A request to run a job type with an input.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    /// Type of work to run.
    pub job_type: String,
    /// Deduplication id within the job type.
    pub unique_id: Option<String>,
    /// Serialized input payload.
    pub input: serde_json::Value,
    /// Earliest time the job may run; `None` means now.
    pub start_at: Option<DateTime<Utc>>,
}

impl JobRequest {
    /// Starts building a request for a job type.
    #[must_use]
    pub fn builder(job_type: impl Into<String>) -> JobRequestBuilder {
        JobRequestBuilder {
            job_type: job_type.into(),
            unique_id: None,
            input: Ok(serde_json::Value::Null),
            start_at: None,
            delay: None,
        }
    }

    /// Returns the job key this request schedules under.
    ///
    /// Without a unique id every call yields a new key.
    #[must_use]
    pub fn job_key(&self) -> JobKey {
        let unique_id = self
            .unique_id
            .clone()
            .unwrap_or_else(|| Ulid::new().to_string());
        job_key(&self.job_type, &unique_id)
    }
}

/// Builds the dedup key of a job type and unique id.
#[must_use]
pub fn job_key(job_type: &str, unique_id: &str) -> JobKey {
    let mut name = String::with_capacity(job_type.len() + unique_id.len() + 1);
    for c in job_type.chars() {
        if matches!(c, '_' | '\\') {
            name.push('\\');
        }
        name.push(c);
    }
    name.push('_');
    name.push_str(unique_id);
    JobKey::new(name, DYNAMIC_GROUP)
}

/// Builder for [`JobRequest`].
#[derive(Debug)]
pub struct JobRequestBuilder {
    job_type: String,
    unique_id: Option<String>,
    input: std::result::Result<serde_json::Value, String>,
    start_at: Option<DateTime<Utc>>,
    delay: Option<Duration>,
}

impl JobRequestBuilder {
    /// Sets the deduplication id.
    #[must_use]
    pub fn unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// Sets the input payload.
    #[must_use]
    pub fn input<T: Serialize>(mut self, input: &T) -> Self {
        self.input = serde_json::to_value(input).map_err(|e| e.to_string());
        self
    }

    /// Runs the job no earlier than `start_at`.
    #[must_use]
    pub const fn start_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self
    }

    /// Runs the job no earlier than `delay` after scheduling.
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the input did not serialize, the job type is empty,
    /// or the delay is out of range.
    pub fn build(self) -> Result<JobRequest> {
        if self.job_type.trim().is_empty() {
            return Err(Error::invalid_definition("job type must not be empty"));
        }
        let input = self
            .input
            .map_err(|message| Error::Serialization { message })?;
        let start_at = match (self.start_at, self.delay) {
            (Some(at), _) => Some(at),
            (None, Some(delay)) => {
                let delay = chrono::Duration::from_std(delay).map_err(|_| {
                    Error::invalid_definition(format!("job delay {delay:?} out of range"))
                })?;
                Some(Utc::now() + delay)
            }
            (None, None) => None,
        };
        Ok(JobRequest {
            job_type: self.job_type,
            unique_id: self.unique_id,
            input,
            start_at,
        })
    }
}

/// Result of scheduling a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A new pending job was created.
    Inserted {
        /// The job key.
        key: JobKey,
    },
    /// A pending job with the same key was overwritten.
    Replaced {
        /// The job key.
        key: JobKey,
    },
}

impl ScheduleOutcome {
    /// Returns the scheduled job key.
    #[must_use]
    pub const fn key(&self) -> &JobKey {
        match self {
            Self::Inserted { key } | Self::Replaced { key } => key,
        }
    }

    /// Returns true if an existing pending job was overwritten.
    #[must_use]
    pub const fn is_replaced(&self) -> bool {
        matches!(self, Self::Replaced { .. })
    }
}

/// Schedules follow-up jobs with at most one pending instance per key.
#[derive(Clone)]
pub struct DedupJobScheduler {
    scheduler: Arc<dyn Scheduler>,
    metrics: ReconcileMetrics,
}

impl std::fmt::Debug for DedupJobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupJobScheduler").finish_non_exhaustive()
    }
}

impl DedupJobScheduler {
    /// Creates a scheduler front for the given backing scheduler.
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            metrics: ReconcileMetrics::new(),
        }
    }

    /// Schedules `input` for `job_type`, deduplicated by `unique_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input does not serialize or the backing
    /// scheduler fails.
    pub async fn schedule<T: Serialize + Sync>(
        &self,
        job_type: &str,
        unique_id: &str,
        input: &T,
    ) -> Result<ScheduleOutcome> {
        let request = JobRequest::builder(job_type)
            .unique_id(unique_id)
            .input(input)
            .build()?;
        self.schedule_request(request).await
    }

    /// Schedules a prepared request.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing scheduler fails.
    pub async fn schedule_request(&self, request: JobRequest) -> Result<ScheduleOutcome> {
        let key = request.job_key();
        let requested_at = Utc::now();
        let pending = PendingJob {
            entry_id: Ulid::new().to_string(),
            key: key.clone(),
            job_type: request.job_type.clone(),
            input: request.input,
            fire_at: request.start_at.unwrap_or(requested_at),
            requested_at,
        };

        let outcome = match self.scheduler.upsert_pending(pending).await? {
            UpsertOutcome::Inserted => {
                self.metrics.record_job_scheduled(&request.job_type, "inserted");
                ScheduleOutcome::Inserted { key }
            }
            UpsertOutcome::Replaced { previous } => {
                debug!(
                    job_key = %key,
                    replaced_entry = %previous.entry_id,
                    "replaced pending job"
                );
                self.metrics.record_job_scheduled(&request.job_type, "replaced");
                ScheduleOutcome::Replaced { key }
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::memory::InMemoryScheduler;
    use serde_json::json;

    #[test]
    fn key_combines_job_type_and_unique_id() {
        let key = job_key("BranchNotificationJob", "42");
        assert_eq!(key.name, "BranchNotificationJob_42");
        assert_eq!(key.group, DYNAMIC_GROUP);
    }

    #[test]
    fn separators_in_job_type_are_escaped() {
        assert_eq!(job_key("notify_a", "1").name, r"notify\_a_1");
        assert_eq!(job_key("notify", "a_1").name, "notify_a_1");
        assert_ne!(job_key(r"a\", "_b"), job_key("a_", "b"));
    }

    #[test]
    fn requests_without_unique_id_get_distinct_keys() {
        let request = JobRequest::builder("Cleanup").build().unwrap();
        assert_ne!(request.job_key(), request.job_key());
    }

    #[test]
    fn empty_job_type_is_rejected() {
        assert!(JobRequest::builder(" ").build().is_err());
    }

    #[test]
    fn delay_sets_start_at() {
        let before = Utc::now();
        let request = JobRequest::builder("Cleanup")
            .delay(Duration::from_secs(60))
            .build()
            .unwrap();
        assert!(request
            .start_at
            .is_some_and(|at| at >= before + chrono::Duration::seconds(60)));
    }

    #[tokio::test]
    async fn second_schedule_overwrites_pending_input() {
        let backing = Arc::new(InMemoryScheduler::new());
        let jobs = DedupJobScheduler::new(backing.clone());

        let first = jobs.schedule("notify", "42", &json!({"v": 1})).await.unwrap();
        let second = jobs.schedule("notify", "42", &json!({"v": 2})).await.unwrap();

        assert!(!first.is_replaced());
        assert!(second.is_replaced());
        assert_eq!(first.key(), second.key());
        assert_eq!(backing.pending_count().unwrap(), 1);
        let pending = backing.pending(second.key()).unwrap().unwrap();
        assert_eq!(pending.input, json!({"v": 2}));
    }

    #[tokio::test]
    async fn start_at_is_carried_to_pending_job() {
        let backing = Arc::new(InMemoryScheduler::new());
        let jobs = DedupJobScheduler::new(backing.clone());
        let at = Utc::now() + chrono::Duration::minutes(5);

        let request = JobRequest::builder("notify")
            .unique_id("7")
            .start_at(at)
            .build()
            .unwrap();
        let outcome = jobs.schedule_request(request).await.unwrap();

        let pending = backing.pending(outcome.key()).unwrap().unwrap();
        assert_eq!(pending.fire_at, at);
    }
}
