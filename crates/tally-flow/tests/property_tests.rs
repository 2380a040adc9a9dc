//! Property-based tests for statistics reconciliation invariants.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated text units and branch mappings.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use tokio_test::block_on;

use tally_flow::search::TranslationStatus;
use tally_test_utils::{assert_statistic_matches_rows, TestWorld};

/// Generates a translation status.
fn arb_status() -> impl Strategy<Value = TranslationStatus> {
    prop::sample::select(vec![
        TranslationStatus::Untranslated,
        TranslationStatus::TranslationNeeded,
        TranslationStatus::ReviewNeeded,
        TranslationStatus::Approved,
    ])
}

/// Generates indexed text units: id -> statuses of its target locales.
fn arb_index() -> impl Strategy<Value = BTreeMap<i64, Vec<TranslationStatus>>> {
    prop::collection::btree_map(1i64..30, prop::collection::vec(arb_status(), 0..4), 0..15)
}

/// Generates a branch mapping over a slightly wider id range than the index.
fn arb_mapping() -> impl Strategy<Value = BTreeSet<i64>> {
    prop::collection::btree_set(1i64..35, 0..20)
}

fn seed(world: &TestWorld, index: &BTreeMap<i64, Vec<TranslationStatus>>) {
    for (id, statuses) in index {
        world.index_text_unit(*id, statuses);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn rows_track_exactly_the_mapped_indexed_units(
        index in arb_index(),
        first in arb_mapping(),
        second in arb_mapping(),
    ) {
        let world = TestWorld::new();
        seed(&world, &index);
        let branch = world.branch(1, "feature-x");
        let reconciler = world.reconciler();

        world.map_text_units(&branch, first.iter().copied());
        block_on(reconciler.reconcile(&branch)).unwrap();
        world.map_text_units(&branch, second.iter().copied());
        let statistic = block_on(reconciler.reconcile(&branch)).unwrap();

        let expected: Vec<i64> = second
            .iter()
            .copied()
            .filter(|id| index.contains_key(id))
            .collect();
        prop_assert_eq!(world.tracked_ids(&branch), expected);
        assert_statistic_matches_rows(&statistic, &world.rows(&branch));
    }

    #[test]
    fn counts_follow_locale_statuses(
        index in arb_index(),
        mapping in arb_mapping(),
    ) {
        let world = TestWorld::new();
        seed(&world, &index);
        let branch = world.branch(1, "feature-x");
        world.map_text_units(&branch, mapping.iter().copied());

        block_on(world.reconciler().reconcile(&branch)).unwrap();

        for row in world.rows(&branch) {
            let statuses = &index[&row.text_unit_id.get()];
            let for_translation = statuses.iter().filter(|s| s.is_for_translation()).count();
            prop_assert_eq!(row.total_count, statuses.len() as u64);
            prop_assert_eq!(row.for_translation_count, for_translation as u64);
        }
    }

    #[test]
    fn second_run_changes_nothing(
        index in arb_index(),
        mapping in arb_mapping(),
    ) {
        let world = TestWorld::new();
        seed(&world, &index);
        let branch = world.branch(1, "feature-x");
        world.map_text_units(&branch, mapping.iter().copied());
        let reconciler = world.reconciler();

        let first = block_on(reconciler.reconcile(&branch)).unwrap();
        let rows = world.rows(&branch);
        let second = block_on(reconciler.reconcile(&branch)).unwrap();

        prop_assert_eq!(first, second);
        prop_assert_eq!(rows, world.rows(&branch));
    }
}
