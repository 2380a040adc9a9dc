//! Custom assertion helpers for integration tests.

use tally_flow::model::{BranchStatistic, BranchTextUnitStatistic};

use crate::scheduler::{OpKind, TracingScheduler};

/// Asserts that a branch statistic equals the sums of its rows.
///
/// # Panics
///
/// Panics if a row belongs to another statistic or a sum differs.
pub fn assert_statistic_matches_rows(
    statistic: &BranchStatistic,
    rows: &[BranchTextUnitStatistic],
) {
    for row in rows {
        assert_eq!(
            row.branch_statistic_id, statistic.id,
            "row {:?} belongs to another statistic",
            row.id
        );
    }
    let total: u64 = rows.iter().map(|row| row.total_count).sum();
    let for_translation: u64 = rows.iter().map(|row| row.for_translation_count).sum();
    assert_eq!(
        statistic.total_count, total,
        "Expected total count {total}, statistic has {}",
        statistic.total_count
    );
    assert_eq!(
        statistic.for_translation_count, for_translation,
        "Expected for-translation count {for_translation}, statistic has {}",
        statistic.for_translation_count
    );
}

/// Asserts that operation `before` was recorded, and recorded before `after` if `after` was.
///
/// # Panics
///
/// Panics if `before` is missing or came later.
pub fn assert_op_before(scheduler: &TracingScheduler, before: OpKind, after: OpKind) {
    let operations = scheduler.operations();
    let Some(first) = scheduler.position(before) else {
        panic!("Expected {before:?} to be recorded, operations: {operations:?}");
    };
    if let Some(second) = scheduler.position(after) {
        assert!(
            first < second,
            "Expected {before:?} before {after:?}, operations: {operations:?}"
        );
    }
}

/// Asserts that no operation of a kind was recorded.
///
/// # Panics
///
/// Panics if an operation of that kind was recorded.
pub fn assert_op_absent(scheduler: &TracingScheduler, kind: OpKind) {
    assert!(
        scheduler.position(kind).is_none(),
        "Expected no {kind:?}, operations: {:?}",
        scheduler.operations()
    );
}
