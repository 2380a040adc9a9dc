//! Contract tests for the test utilities themselves.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use tally_flow::scheduler::{JobDefinition, Scheduler, DEFAULT_GROUP};
use tally_core::TextUnitId;
use tally_flow::search::{SearchParameters, TextUnitSearcher, TranslationStatus};
use tally_test_utils::{OpKind, SchedulerOp, TestWorld, TracingScheduler};

#[tokio::test]
async fn tracing_scheduler_records_in_call_order() {
    let scheduler = TracingScheduler::new();

    scheduler.job_keys(DEFAULT_GROUP).await.unwrap();
    scheduler
        .add_job(&JobDefinition::new("purge", "PurgeJob"), true)
        .await
        .unwrap();
    scheduler.start_delayed(Duration::ZERO).await.unwrap();

    let kinds: Vec<OpKind> = scheduler.operations().iter().map(SchedulerOp::kind).collect();
    assert_eq!(kinds, vec![OpKind::JobKeys, OpKind::AddJob, OpKind::StartDelayed]);
}

#[tokio::test]
async fn injected_failure_leaves_state_untouched() {
    let scheduler = TracingScheduler::new();
    scheduler.inject_failure(OpKind::AddJob);

    let result = scheduler
        .add_job(&JobDefinition::new("purge", "PurgeJob"), true)
        .await;

    assert!(result.is_err());
    assert!(scheduler.job_keys(DEFAULT_GROUP).await.unwrap().is_empty());
}

#[test]
fn world_indexes_one_locale_per_status() {
    let world = TestWorld::new();
    let branch = world.branch(7, "feature-x");
    world.index_text_unit(1, &[TranslationStatus::Approved, TranslationStatus::Untranslated]);
    world.map_text_units(&branch, [1]);

    assert_eq!(world.searcher.search_calls(), 0);
    assert!(world.rows(&branch).is_empty());
}

#[tokio::test]
async fn count_failure_leaves_search_working() {
    let world = TestWorld::new();
    world.index_text_unit(1, &[TranslationStatus::Approved]);
    world.failing_searcher.inject_count_failure(TextUnitId::new(1));
    let params = SearchParameters::new().with_text_unit_ids([TextUnitId::new(1)]);

    assert_eq!(world.failing_searcher.search(&params).await.unwrap().len(), 1);
    assert!(world
        .failing_searcher
        .count_text_unit_and_word_count(&params)
        .await
        .is_err());

    world.failing_searcher.clear_failures();
    let count = world
        .failing_searcher
        .count_text_unit_and_word_count(&params)
        .await
        .unwrap();
    assert_eq!(count.text_unit_count, 1);
}
