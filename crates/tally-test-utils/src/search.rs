//! Searcher wrapper with failure injection.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tally_core::TextUnitId;
use tally_flow::error::{Error, Result};
use tally_flow::search::memory::InMemoryTextUnitSearcher;
use tally_flow::search::{SearchParameters, TextUnitAndWordCount, TextUnitDto, TextUnitSearcher};

#[derive(Debug, Default)]
struct Failures {
    any: HashSet<TextUnitId>,
    counts: HashSet<TextUnitId>,
}

/// Delegates to an [`InMemoryTextUnitSearcher`] but fails queries touching
/// injected text units.
#[derive(Debug, Clone)]
pub struct FailingSearcher {
    inner: Arc<InMemoryTextUnitSearcher>,
    failures: Arc<Mutex<Failures>>,
}

impl FailingSearcher {
    /// Wraps a searcher.
    pub fn new(inner: Arc<InMemoryTextUnitSearcher>) -> Self {
        Self {
            inner,
            failures: Arc::default(),
        }
    }

    /// Makes every query restricted to this text unit fail.
    pub fn inject_failure(&self, text_unit_id: TextUnitId) {
        self.failures.lock().expect("lock").any.insert(text_unit_id);
    }

    /// Makes only count queries for this text unit fail; searches still pass.
    pub fn inject_count_failure(&self, text_unit_id: TextUnitId) {
        self.failures.lock().expect("lock").counts.insert(text_unit_id);
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        let mut failures = self.failures.lock().expect("lock");
        failures.any.clear();
        failures.counts.clear();
    }

    fn check(&self, params: &SearchParameters, counting: bool) -> Result<()> {
        let failures = self.failures.lock().expect("lock");
        let failing = params.text_unit_ids.iter().find(|id| {
            failures.any.contains(*id) || (counting && failures.counts.contains(*id))
        });
        if let Some(id) = failing {
            return Err(Error::search(format!("injected failure for text unit {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl TextUnitSearcher for FailingSearcher {
    async fn search(&self, params: &SearchParameters) -> Result<Vec<TextUnitDto>> {
        self.check(params, false)?;
        self.inner.search(params).await
    }

    async fn count_text_unit_and_word_count(
        &self,
        params: &SearchParameters,
    ) -> Result<TextUnitAndWordCount> {
        self.check(params, true)?;
        self.inner.count_text_unit_and_word_count(params).await
    }
}
