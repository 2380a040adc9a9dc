//! Log output of fatal scheduler startup failures.
//!
//! Kept in its own test binary: `traced_test` installs the global subscriber.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use tracing_test::traced_test;

use tally_flow::config::ReconcileConfig;
use tally_flow::error::{Error, StartupPhase};
use tally_flow::registry::{start_scheduler, JobRegistry};
use tally_flow::scheduler::{JobDefinition, Scheduler};
use tally_test_utils::{OpKind, TracingScheduler};

fn registry() -> JobRegistry {
    JobRegistry::new()
        .with_job(JobDefinition::new("purge", "PurgeJob"))
        .unwrap()
}

#[tokio::test]
#[traced_test]
async fn cleanup_failure_is_logged_as_error() {
    let scheduler = Arc::new(TracingScheduler::new());
    scheduler.inject_failure(OpKind::JobKeys);

    let err = start_scheduler(scheduler.clone(), registry(), &ReconcileConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::StartupCleanup {
            phase: StartupPhase::ReadLiveKeys,
            ..
        }
    ));
    assert!(logs_contain("scheduler registry cleanup failed"));
}

#[tokio::test]
#[traced_test]
async fn start_failure_is_logged_as_error() {
    let scheduler = Arc::new(TracingScheduler::new());
    scheduler.inject_failure(OpKind::StartDelayed);

    let err = start_scheduler(scheduler.clone(), registry(), &ReconcileConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::StartupCleanup {
            phase: StartupPhase::Start,
            ..
        }
    ));
    assert!(logs_contain("scheduler start failed"));
    assert!(!logs_contain("scheduler started"));
    assert!(!scheduler.is_started().await.unwrap());
}

#[tokio::test]
#[traced_test]
async fn registration_failure_is_logged_as_error() {
    let scheduler = Arc::new(TracingScheduler::new());
    scheduler.inject_failure(OpKind::AddJob);

    let err = start_scheduler(scheduler.clone(), registry(), &ReconcileConfig::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("register_declared"));
    assert!(logs_contain("scheduler start failed"));
    assert!(!scheduler.is_started().await.unwrap());
}
