//! Pre-built test fixtures for common test scenarios.
//!
//! Provides a seeded in-memory world and factory functions with sensible
//! defaults.

use std::sync::Arc;

use tally_core::{BranchId, RepositoryId, TextUnitId};
use tally_flow::batch::BranchBatchDriver;
use tally_flow::config::ReconcileConfig;
use tally_flow::jobs::DedupJobScheduler;
use tally_flow::model::{Branch, BranchTextUnitStatistic};
use tally_flow::search::memory::InMemoryTextUnitSearcher;
use tally_flow::search::{TextUnitSearcher, TranslationStatus};
use tally_flow::statistics::{StatisticsContext, StatisticsReconciler};
use tally_flow::store::memory::InMemoryStore;

use crate::scheduler::TracingScheduler;
use crate::search::FailingSearcher;

/// Target locales assigned, in order, by [`TestWorld::index_text_unit`].
pub const TARGET_LOCALES: [&str; 6] = ["fr-FR", "de-DE", "ja-JP", "it-IT", "es-ES", "ko-KR"];

/// Test world with pre-configured collaborators for one repository.
pub struct TestWorld {
    /// Branches, statistics and text unit mapping.
    pub store: Arc<InMemoryStore>,
    /// Indexed text units.
    pub searcher: Arc<InMemoryTextUnitSearcher>,
    /// Failure-injecting front of [`Self::searcher`], used by reconcilers.
    pub failing_searcher: Arc<FailingSearcher>,
    /// Scheduler receiving follow-up jobs.
    pub scheduler: Arc<TracingScheduler>,
    /// Repository the factories create data in.
    pub repository_id: RepositoryId,
}

impl TestWorld {
    /// Creates an empty world for repository 1.
    #[must_use]
    pub fn new() -> Self {
        Self::with_repository(RepositoryId::new(1))
    }

    /// Creates an empty world for the given repository.
    #[must_use]
    pub fn with_repository(repository_id: RepositoryId) -> Self {
        let searcher = Arc::new(InMemoryTextUnitSearcher::new());
        Self {
            store: Arc::new(InMemoryStore::new()),
            failing_searcher: Arc::new(FailingSearcher::new(Arc::clone(&searcher))),
            searcher,
            scheduler: Arc::new(TracingScheduler::new()),
            repository_id,
        }
    }

    /// Returns the collaborator bundle backed by this world.
    pub fn context(&self) -> StatisticsContext {
        let searcher: Arc<dyn TextUnitSearcher> = self.failing_searcher.clone();
        StatisticsContext {
            branches: self.store.clone(),
            statistics: self.store.clone(),
            text_unit_statistics: self.store.clone(),
            mapping: self.store.clone(),
            searcher,
        }
    }

    /// Creates a reconciler over this world.
    pub fn reconciler(&self) -> StatisticsReconciler {
        StatisticsReconciler::new(self.context())
    }

    /// Creates a dedup job scheduler over this world's scheduler.
    pub fn jobs(&self) -> DedupJobScheduler {
        DedupJobScheduler::new(self.scheduler.clone())
    }

    /// Creates a batch driver with the given config.
    pub fn driver(&self, config: ReconcileConfig) -> BranchBatchDriver {
        BranchBatchDriver::new(self.reconciler(), self.jobs(), config)
    }

    /// Stores a live, named branch.
    pub fn branch(&self, id: i64, name: &str) -> Branch {
        self.insert(Branch::new(BranchId::new(id), self.repository_id, name))
    }

    /// Stores a branch as given.
    pub fn insert(&self, branch: Branch) -> Branch {
        self.store.insert_branch(branch.clone()).unwrap();
        branch
    }

    /// Indexes a text unit with one target locale per status.
    ///
    /// Every target locale must be fully translated, so the for-translation
    /// count is the number of untranslated or needs-translation statuses.
    pub fn index_text_unit(&self, id: i64, statuses: &[TranslationStatus]) -> TextUnitId {
        let text_unit_id = TextUnitId::new(id);
        self.searcher
            .add_text_unit(self.repository_id, text_unit_id, format!("unit-{id}"), 3)
            .unwrap();
        for (locale, status) in TARGET_LOCALES.iter().zip(statuses) {
            self.searcher
                .add_translation(text_unit_id, *locale, *status, true)
                .unwrap();
        }
        text_unit_id
    }

    /// Replaces the text units mapped to a branch.
    pub fn map_text_units(&self, branch: &Branch, ids: impl IntoIterator<Item = i64>) {
        self.store
            .set_text_unit_ids(branch.id, ids.into_iter().map(TextUnitId::new))
            .unwrap();
    }

    /// Returns the per-text-unit rows of a branch, ordered by text unit.
    pub fn rows(&self, branch: &Branch) -> Vec<BranchTextUnitStatistic> {
        self.store.text_unit_statistics_of(branch.id).unwrap()
    }

    /// Returns the text units tracked for a branch, ordered.
    pub fn tracked_ids(&self, branch: &Branch) -> Vec<i64> {
        self.rows(branch)
            .into_iter()
            .map(|row| row.text_unit_id.get())
            .collect()
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}
