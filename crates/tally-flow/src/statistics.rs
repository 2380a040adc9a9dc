//! Branch statistics reconciliation.
//!
//! [`StatisticsReconciler::reconcile`] brings the cached statistics of one
//! branch in line with the authoritative text units of that branch:
//!
//! 1. Load or create the branch's [`BranchStatistic`]
//! 2. Snapshot the text units currently tracked by its child rows
//! 3. Ask the searcher for the branch's text units (the desired set)
//! 4. Create or update one row per desired text unit with freshly counted values
//! 5. Store the summed counts on the branch statistic
//! 6. Bulk-delete the rows of text units no longer in the desired set
//!
//! Reconciliation is idempotent. A failure aborts the branch and the next run
//! repairs whatever was left behind, so there is no rollback.
//!
//! Runs for the same branch are serialized through [`BranchLocks`]; different
//! branches proceed in parallel.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, Instrument};

use tally_core::observability::reconcile_span;
use tally_core::{BranchId, TextUnitId};

use crate::error::Result;
use crate::lock::BranchLocks;
use crate::metrics::{time_branch_reconcile, ReconcileMetrics};
use crate::model::{
    Branch, BranchStatistic, BranchTextUnitStatistic, NewBranchTextUnitStatistic, TextUnitCounts,
};
use crate::search::{SearchParameters, StatusFilter, TextUnitDto, TextUnitSearcher};
use crate::store::{
    BranchStatisticStore, BranchStore, BranchTextUnitStatisticStore, TextUnitMapping,
};

/// The collaborators a reconciliation needs.
#[derive(Clone)]
pub struct StatisticsContext {
    /// Branch lookup.
    pub branches: Arc<dyn BranchStore>,
    /// Aggregate statistic rows.
    pub statistics: Arc<dyn BranchStatisticStore>,
    /// Per-text-unit statistic rows.
    pub text_unit_statistics: Arc<dyn BranchTextUnitStatisticStore>,
    /// Branch to text unit mapping.
    pub mapping: Arc<dyn TextUnitMapping>,
    /// Text unit search and counting.
    pub searcher: Arc<dyn TextUnitSearcher>,
}

impl std::fmt::Debug for StatisticsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsContext").finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RowActions {
    created: u64,
    updated: u64,
    unchanged: u64,
}

/// Recomputes the cached translation statistics of branches.
#[derive(Debug, Clone)]
pub struct StatisticsReconciler {
    ctx: StatisticsContext,
    locks: BranchLocks,
    metrics: ReconcileMetrics,
}

impl StatisticsReconciler {
    /// Creates a reconciler over the given collaborators.
    #[must_use]
    pub fn new(ctx: StatisticsContext) -> Self {
        Self {
            ctx,
            locks: BranchLocks::new(),
            metrics: ReconcileMetrics::new(),
        }
    }

    /// Returns the collaborators.
    #[must_use]
    pub const fn context(&self) -> &StatisticsContext {
        &self.ctx
    }

    /// Loads a branch by id and reconciles it.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch does not exist or any collaborator fails.
    pub async fn reconcile_branch(&self, branch_id: BranchId) -> Result<BranchStatistic> {
        let branch = self
            .ctx
            .branches
            .find_branch(branch_id)
            .await?
            .ok_or_else(|| tally_core::Error::resource_not_found("branch", branch_id))?;
        self.reconcile(&branch).await
    }

    /// Reconciles the statistics of one branch and returns the updated aggregate.
    ///
    /// # Errors
    ///
    /// Returns an error if any collaborator fails. The branch's statistics are
    /// then stale until the next successful run.
    pub async fn reconcile(&self, branch: &Branch) -> Result<BranchStatistic> {
        let span = reconcile_span("reconcile_branch", branch.repository_id, branch.id);
        async {
            let _timer = time_branch_reconcile();
            let result = self.reconcile_locked(branch).await;
            self.metrics
                .record_branch(if result.is_ok() { "succeeded" } else { "failed" });
            result
        }
        .instrument(span)
        .await
    }

    async fn reconcile_locked(&self, branch: &Branch) -> Result<BranchStatistic> {
        let _guard = self.locks.lock(branch.id).await?;

        let mut statistic = self.load_or_create_statistic(branch.id).await?;
        let mut tracked: HashSet<TextUnitId> = self
            .ctx
            .text_unit_statistics
            .find_by_branch_statistic(statistic.id)
            .await?
            .into_iter()
            .map(|row| row.text_unit_id)
            .collect();

        let text_units = self.text_units_for_branch(branch).await?;

        let mut totals = TextUnitCounts::default();
        let mut actions = RowActions::default();
        for text_unit in &text_units {
            tracked.remove(&text_unit.text_unit_id);
            let counts = self.count_text_unit(text_unit).await?;
            self.upsert_row(&statistic, text_unit.text_unit_id, counts, &mut actions)
                .await?;
            totals.total += counts.total;
            totals.for_translation += counts.for_translation;
        }

        statistic.total_count = totals.total;
        statistic.for_translation_count = totals.for_translation;
        self.ctx.statistics.save_statistic(&statistic).await?;

        let deleted = self
            .ctx
            .text_unit_statistics
            .delete_by_branch_and_text_unit_ids_in(branch.id, &tracked)
            .await?;

        self.metrics.record_rows("created", actions.created);
        self.metrics.record_rows("updated", actions.updated);
        self.metrics.record_rows("unchanged", actions.unchanged);
        self.metrics.record_rows("deleted", deleted);

        info!(
            branch = branch.display_name(),
            text_units = text_units.len(),
            created = actions.created,
            updated = actions.updated,
            deleted,
            total_count = statistic.total_count,
            for_translation_count = statistic.for_translation_count,
            "reconciled branch statistics"
        );
        Ok(statistic)
    }

    /// Returns the authoritative text units of a branch, one entry per text unit.
    ///
    /// A branch without mapped text units has none, and the searcher is not asked.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping or the search fails.
    pub async fn text_units_for_branch(&self, branch: &Branch) -> Result<Vec<TextUnitDto>> {
        let text_unit_ids = self.ctx.mapping.find_text_unit_ids_by_branch(branch.id).await?;
        if text_unit_ids.is_empty() {
            debug!(branch_id = %branch.id, "branch has no mapped text units");
            return Ok(Vec::new());
        }

        let params = SearchParameters::new()
            .with_repository_id(branch.repository_id)
            .with_text_unit_ids(text_unit_ids)
            .for_root_locale();
        let results = self.ctx.searcher.search(&params).await?;

        let mut seen = HashSet::with_capacity(results.len());
        let returned = results.len();
        let unique: Vec<_> = results
            .into_iter()
            .filter(|dto| seen.insert(dto.text_unit_id))
            .collect();
        if unique.len() != returned {
            debug!(
                branch_id = %branch.id,
                duplicates = returned - unique.len(),
                "dropped duplicate text units from search results"
            );
        }
        Ok(unique)
    }

    async fn load_or_create_statistic(&self, branch_id: BranchId) -> Result<BranchStatistic> {
        if let Some(statistic) = self.ctx.statistics.find_by_branch(branch_id).await? {
            return Ok(statistic);
        }
        debug!(branch_id = %branch_id, "creating branch statistic");
        self.ctx.statistics.create_for_branch(branch_id).await
    }

    async fn count_text_unit(&self, text_unit: &TextUnitDto) -> Result<TextUnitCounts> {
        let for_translation = SearchParameters::new()
            .with_repository_id(text_unit.repository_id)
            .with_text_unit_ids([text_unit.text_unit_id])
            .with_status_filter(StatusFilter::ForTranslation)
            .with_to_be_fully_translated(true);
        let total = SearchParameters::new().with_text_unit_ids([text_unit.text_unit_id]);

        let for_translation = self
            .ctx
            .searcher
            .count_text_unit_and_word_count(&for_translation)
            .await?;
        let total = self.ctx.searcher.count_text_unit_and_word_count(&total).await?;

        Ok(TextUnitCounts {
            total: total.text_unit_count,
            for_translation: for_translation.text_unit_count,
        })
    }

    async fn upsert_row(
        &self,
        statistic: &BranchStatistic,
        text_unit_id: TextUnitId,
        counts: TextUnitCounts,
        actions: &mut RowActions,
    ) -> Result<()> {
        let existing = self
            .ctx
            .text_unit_statistics
            .find_by_statistic_and_text_unit(statistic.id, text_unit_id)
            .await?;

        match existing {
            None => {
                let row = self
                    .ctx
                    .text_unit_statistics
                    .create_text_unit_statistic(NewBranchTextUnitStatistic {
                        branch_statistic_id: statistic.id,
                        text_unit_id,
                        counts,
                    })
                    .await?;
                debug!(
                    text_unit_id = %row.text_unit_id,
                    row_id = %row.id,
                    "created text unit statistic"
                );
                actions.created += 1;
            }
            Some(row) if row.has_counts(counts) => actions.unchanged += 1,
            Some(row) => {
                let row = BranchTextUnitStatistic {
                    total_count: counts.total,
                    for_translation_count: counts.for_translation,
                    ..row
                };
                self.ctx
                    .text_unit_statistics
                    .save_text_unit_statistic(&row)
                    .await?;
                debug!(text_unit_id = %row.text_unit_id, "updated text unit statistic");
                actions.updated += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::search::memory::InMemoryTextUnitSearcher;
    use crate::search::TranslationStatus;
    use crate::store::memory::InMemoryStore;
    use tally_core::RepositoryId;

    struct Harness {
        store: Arc<InMemoryStore>,
        searcher: Arc<InMemoryTextUnitSearcher>,
        reconciler: StatisticsReconciler,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let searcher = Arc::new(InMemoryTextUnitSearcher::new());
        let reconciler = StatisticsReconciler::new(StatisticsContext {
            branches: store.clone(),
            statistics: store.clone(),
            text_unit_statistics: store.clone(),
            mapping: store.clone(),
            searcher: searcher.clone(),
        });
        Harness {
            store,
            searcher,
            reconciler,
        }
    }

    fn index(searcher: &InMemoryTextUnitSearcher, id: i64, untranslated_locales: usize) {
        let text_unit_id = TextUnitId::new(id);
        searcher
            .add_text_unit(RepositoryId::new(1), text_unit_id, format!("unit-{id}"), 2)
            .unwrap();
        searcher
            .add_translation(text_unit_id, "fr-FR", TranslationStatus::Approved, true)
            .unwrap();
        for locale in ["de-DE", "ja-JP", "it-IT"].into_iter().take(untranslated_locales) {
            searcher
                .add_translation(text_unit_id, locale, TranslationStatus::Untranslated, true)
                .unwrap();
        }
    }

    #[tokio::test]
    async fn first_run_creates_statistic_and_rows() {
        let h = harness();
        let branch = Branch::new(BranchId::new(10), RepositoryId::new(1), "feature-x");
        h.store.insert_branch(branch.clone()).unwrap();
        index(&h.searcher, 1, 1);
        index(&h.searcher, 2, 0);
        h.store
            .set_text_unit_ids(branch.id, [TextUnitId::new(1), TextUnitId::new(2)])
            .unwrap();

        let statistic = h.reconciler.reconcile(&branch).await.unwrap();

        assert_eq!(statistic.total_count, 3);
        assert_eq!(statistic.for_translation_count, 1);
        let rows = h.store.text_unit_statistics_of(branch.id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].total_count, rows[0].for_translation_count), (2, 1));
        assert_eq!((rows[1].total_count, rows[1].for_translation_count), (1, 0));
    }

    #[tokio::test]
    async fn unmapped_branch_skips_search() {
        let h = harness();
        let branch = Branch::new(BranchId::new(11), RepositoryId::new(1), "empty");

        let units = h.reconciler.text_units_for_branch(&branch).await.unwrap();

        assert!(units.is_empty());
        assert_eq!(h.searcher.search_calls(), 0);
    }

    #[tokio::test]
    async fn duplicate_search_results_are_counted_once() {
        let h = harness();
        let branch = Branch::new(BranchId::new(12), RepositoryId::new(1), "dupes");
        index(&h.searcher, 5, 1);
        // Index the root variant twice so the search returns unit 5 twice.
        h.searcher
            .add_text_unit(RepositoryId::new(1), TextUnitId::new(5), "unit-5", 2)
            .unwrap();
        h.store.set_text_unit_ids(branch.id, [TextUnitId::new(5)]).unwrap();

        let units = h.reconciler.text_units_for_branch(&branch).await.unwrap();
        let statistic = h.reconciler.reconcile(&branch).await.unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(statistic.total_count, 2);
        assert_eq!(h.store.text_unit_statistics_of(branch.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reconcile_branch_requires_existing_branch() {
        let h = harness();

        let err = h.reconciler.reconcile_branch(BranchId::new(404)).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Core(tally_core::Error::ResourceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_runs_for_one_branch_create_one_statistic() {
        let h = harness();
        let branch = Branch::new(BranchId::new(13), RepositoryId::new(1), "racy");
        index(&h.searcher, 1, 2);
        h.store.set_text_unit_ids(branch.id, [TextUnitId::new(1)]).unwrap();

        let (a, b) = tokio::join!(h.reconciler.reconcile(&branch), h.reconciler.reconcile(&branch));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(h.store.statistic_count(branch.id).unwrap(), 1);
    }
}
