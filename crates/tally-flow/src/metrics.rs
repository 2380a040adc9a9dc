//! Observability metrics for reconciliation.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `tally_branch_reconciliations_total` | Counter | `status` | Branch reconciliations by outcome |
//! | `tally_branch_reconcile_duration_seconds` | Histogram | - | Time to reconcile one branch |
//! | `tally_text_unit_statistics_total` | Counter | `action` | Per-text-unit rows created, updated, unchanged, deleted |
//! | `tally_jobs_scheduled_total` | Counter | `job_type`, `result` | Deduplicated job requests by outcome |
//! | `tally_registry_stale_keys_total` | Counter | `kind` | Stale jobs/triggers removed at startup |
//!
//! Metrics go through the `metrics` crate facade; without an installed
//! recorder every call is a no-op.

use std::time::{Duration, Instant};

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Branch reconciliations by outcome.
    pub const BRANCH_RECONCILIATIONS_TOTAL: &str = "tally_branch_reconciliations_total";
    /// Histogram: Branch reconciliation duration in seconds.
    pub const BRANCH_RECONCILE_DURATION_SECONDS: &str = "tally_branch_reconcile_duration_seconds";
    /// Counter: Per-text-unit statistic rows by action.
    pub const TEXT_UNIT_STATISTICS_TOTAL: &str = "tally_text_unit_statistics_total";
    /// Counter: Deduplicated job requests by outcome.
    pub const JOBS_SCHEDULED_TOTAL: &str = "tally_jobs_scheduled_total";
    /// Counter: Stale registry keys removed at startup.
    pub const REGISTRY_STALE_KEYS_TOTAL: &str = "tally_registry_stale_keys_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Outcome status (succeeded, failed).
    pub const STATUS: &str = "status";
    /// Row action (created, updated, unchanged, deleted).
    pub const ACTION: &str = "action";
    /// Job type of a scheduled request.
    pub const JOB_TYPE: &str = "job_type";
    /// Result of a scheduling request (inserted, replaced).
    pub const RESULT: &str = "result";
    /// Registry key kind (job, trigger).
    pub const KIND: &str = "kind";
}

/// High-level interface for recording reconciliation metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileMetrics;

impl ReconcileMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Records the outcome of one branch reconciliation.
    pub fn record_branch(&self, status: &'static str) {
        counter!(names::BRANCH_RECONCILIATIONS_TOTAL, labels::STATUS => status).increment(1);
    }

    /// Records per-text-unit row actions.
    pub fn record_rows(&self, action: &'static str, count: u64) {
        if count > 0 {
            counter!(names::TEXT_UNIT_STATISTICS_TOTAL, labels::ACTION => action).increment(count);
        }
    }

    /// Records a scheduling request.
    pub fn record_job_scheduled(&self, job_type: &str, result: &'static str) {
        counter!(
            names::JOBS_SCHEDULED_TOTAL,
            labels::JOB_TYPE => job_type.to_string(),
            labels::RESULT => result,
        )
        .increment(1);
    }

    /// Records stale registry keys removed at startup.
    pub fn record_stale_keys(&self, kind: &'static str, count: usize) {
        let count = u64::try_from(count).unwrap_or(u64::MAX);
        counter!(names::REGISTRY_STALE_KEYS_TOTAL, labels::KIND => kind).increment(count);
    }
}

/// RAII guard for timing operations.
///
/// Automatically records duration when dropped.
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a new timing guard that will call `on_drop` with the elapsed duration.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}

/// Creates a timing guard for one branch reconciliation.
#[must_use]
pub fn time_branch_reconcile() -> TimingGuard<impl FnOnce(Duration)> {
    TimingGuard::new(|duration| {
        histogram!(names::BRANCH_RECONCILE_DURATION_SECONDS).record(duration.as_secs_f64());
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        let metrics = ReconcileMetrics::new();
        metrics.record_branch("succeeded");
        metrics.record_rows("created", 3);
        metrics.record_rows("deleted", 0);
        metrics.record_job_scheduled("BranchNotificationJob", "replaced");
        metrics.record_stale_keys("trigger", 2);
        let _guard = time_branch_reconcile();
    }

    #[test]
    fn timing_guard_measures_duration() {
        let mut recorded_duration = None;

        {
            let _guard = TimingGuard::new(|d| {
                recorded_duration = Some(d);
            });
            std::thread::sleep(Duration::from_millis(10));
        }

        assert!(recorded_duration.is_some_and(|d| d >= Duration::from_millis(10)));
    }
}
