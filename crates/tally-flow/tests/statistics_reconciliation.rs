//! Integration tests for branch statistics reconciliation.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use tally_core::TextUnitId;
use tally_flow::search::TranslationStatus::{
    Approved, ReviewNeeded, TranslationNeeded, Untranslated,
};
use tally_flow::store::BranchStatisticStore;
use tally_test_utils::{assert_statistic_matches_rows, init_test_logging, TestWorld};

#[tokio::test]
async fn rerun_without_changes_is_idempotent() {
    init_test_logging();
    let world = TestWorld::new();
    let branch = world.branch(10, "feature-x");
    world.index_text_unit(1, &[Approved, Untranslated]);
    world.index_text_unit(2, &[TranslationNeeded, ReviewNeeded, Untranslated]);
    world.map_text_units(&branch, [1, 2]);
    let reconciler = world.reconciler();

    let first = reconciler.reconcile(&branch).await.unwrap();
    let rows_after_first = world.rows(&branch);
    let second = reconciler.reconcile(&branch).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(rows_after_first, world.rows(&branch));
}

#[tokio::test]
async fn rows_match_authoritative_text_units_exactly() {
    let world = TestWorld::new();
    let branch = world.branch(10, "feature-x");
    world.index_text_unit(1, &[Approved]);
    world.index_text_unit(2, &[Untranslated]);
    // Mapped but not indexed: the searcher does not return it.
    world.map_text_units(&branch, [1, 2, 99]);
    let reconciler = world.reconciler();

    reconciler.reconcile(&branch).await.unwrap();

    let authoritative: Vec<i64> = reconciler
        .text_units_for_branch(&branch)
        .await
        .unwrap()
        .into_iter()
        .map(|dto| dto.text_unit_id.get())
        .collect();
    assert_eq!(world.tracked_ids(&branch), authoritative);
    assert_eq!(world.tracked_ids(&branch), vec![1, 2]);
}

#[tokio::test]
async fn aggregate_is_sum_of_rows() {
    let world = TestWorld::new();
    let branch = world.branch(10, "feature-x");
    world.index_text_unit(1, &[Approved, Untranslated, Untranslated]);
    world.index_text_unit(2, &[TranslationNeeded]);
    world.index_text_unit(3, &[Approved, ReviewNeeded]);
    world.map_text_units(&branch, [1, 2, 3]);

    let statistic = world.reconciler().reconcile(&branch).await.unwrap();

    assert_eq!(statistic.total_count, 6);
    assert_eq!(statistic.for_translation_count, 3);
    assert_statistic_matches_rows(&statistic, &world.rows(&branch));
}

#[tokio::test]
async fn stale_text_units_are_removed_and_new_ones_added() {
    let world = TestWorld::new();
    let branch = world.branch(10, "feature-x");
    for id in 1..=4 {
        world.index_text_unit(id, &[Untranslated]);
    }
    world.map_text_units(&branch, [1, 2, 3]);
    let reconciler = world.reconciler();
    reconciler.reconcile(&branch).await.unwrap();
    let before = world.rows(&branch);

    world.map_text_units(&branch, [2, 3, 4]);
    world
        .searcher
        .set_status(TextUnitId::new(2), "fr-FR", Approved)
        .unwrap();
    let statistic = reconciler.reconcile(&branch).await.unwrap();

    let after = world.rows(&branch);
    assert_eq!(world.tracked_ids(&branch), vec![2, 3, 4]);
    // Rows 2 and 3 are updated in place, not recreated.
    assert_eq!(after[0].id, before[1].id);
    assert_eq!(after[1].id, before[2].id);
    assert_eq!(after[0].for_translation_count, 0);
    assert_eq!(after[1].for_translation_count, 1);
    assert_eq!(statistic.for_translation_count, 2);
    assert_statistic_matches_rows(&statistic, &after);
}

#[tokio::test]
async fn branch_without_mapping_is_zeroed() {
    let world = TestWorld::new();
    let branch = world.branch(10, "feature-x");
    world.index_text_unit(1, &[Untranslated]);
    world.map_text_units(&branch, [1]);
    let reconciler = world.reconciler();
    reconciler.reconcile(&branch).await.unwrap();

    world.map_text_units(&branch, Vec::new());
    let searches_before = world.searcher.search_calls();
    let statistic = reconciler.reconcile(&branch).await.unwrap();

    assert_eq!(statistic.total_count, 0);
    assert_eq!(statistic.for_translation_count, 0);
    assert!(world.rows(&branch).is_empty());
    assert_eq!(world.searcher.search_calls(), searches_before);
}

#[tokio::test]
async fn text_unit_dropped_from_index_loses_its_row() {
    let world = TestWorld::new();
    let branch = world.branch(10, "feature-x");
    world.index_text_unit(1, &[Untranslated]);
    world.index_text_unit(2, &[Untranslated, Approved]);
    world.map_text_units(&branch, [1, 2]);
    let reconciler = world.reconciler();
    reconciler.reconcile(&branch).await.unwrap();

    // Still mapped, but the search no longer returns it.
    world.searcher.remove_text_unit(TextUnitId::new(2)).unwrap();
    let statistic = reconciler.reconcile(&branch).await.unwrap();

    assert_eq!(world.tracked_ids(&branch), vec![1]);
    assert_eq!(statistic.total_count, 1);
    assert_statistic_matches_rows(&statistic, &world.rows(&branch));
}

#[tokio::test]
async fn run_aborted_mid_way_is_repaired_by_next_run() {
    let world = TestWorld::new();
    let branch = world.branch(10, "feature-x");
    for id in 1..=3 {
        world.index_text_unit(id, &[Untranslated]);
    }
    world.map_text_units(&branch, [1, 3]);
    let reconciler = world.reconciler();
    let before = reconciler.reconcile(&branch).await.unwrap();
    assert_eq!((before.total_count, before.for_translation_count), (2, 2));

    world.map_text_units(&branch, [1, 2]);
    world
        .searcher
        .set_status(TextUnitId::new(1), "fr-FR", Approved)
        .unwrap();
    world.failing_searcher.inject_count_failure(TextUnitId::new(2));
    assert!(reconciler.reconcile(&branch).await.is_err());

    // Unit 1 was rewritten before unit 2 failed; nothing after that ran.
    let rows = world.rows(&branch);
    assert_eq!(world.tracked_ids(&branch), vec![1, 3]);
    assert_eq!(rows[0].for_translation_count, 0);
    let stale = world.store.find_by_branch(branch.id).await.unwrap().unwrap();
    assert_eq!(stale, before);

    world.failing_searcher.clear_failures();
    let statistic = reconciler.reconcile(&branch).await.unwrap();

    assert_eq!(world.tracked_ids(&branch), vec![1, 2]);
    assert_eq!((statistic.total_count, statistic.for_translation_count), (2, 1));
    assert_statistic_matches_rows(&statistic, &world.rows(&branch));
    let stored = world.store.find_by_branch(branch.id).await.unwrap();
    assert_eq!(stored, Some(statistic));
}

#[tokio::test]
async fn failed_run_is_repaired_by_next_run() {
    let world = TestWorld::new();
    let branch = world.branch(10, "feature-x");
    world.index_text_unit(1, &[Untranslated]);
    world.index_text_unit(2, &[Untranslated]);
    world.map_text_units(&branch, [1, 2]);
    let reconciler = world.reconciler();

    world.failing_searcher.inject_failure(TextUnitId::new(2));
    // The mapping search includes unit 2, so the run fails before any row is written.
    assert!(reconciler.reconcile(&branch).await.is_err());

    world.failing_searcher.clear_failures();
    let statistic = reconciler.reconcile(&branch).await.unwrap();

    assert_eq!(world.tracked_ids(&branch), vec![1, 2]);
    assert_statistic_matches_rows(&statistic, &world.rows(&branch));
    let stored = world.store.find_by_branch(branch.id).await.unwrap();
    assert_eq!(stored, Some(statistic));
}
