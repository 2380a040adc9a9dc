//! In-memory text-unit searcher for testing.
//!
//! Indexes one [`TextUnitVariant`] per (text unit, locale) and evaluates
//! [`SearchParameters`] against them:
//!
//! - root-locale variants are only visible with `for_root_locale`
//! - target-locale variants are only visible without it
//! - `to_be_fully_translated` compares against the variant's locale flag
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: Linear scans, no persistence

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use tally_core::{RepositoryId, TextUnitId};

use super::{
    SearchParameters, TextUnitAndWordCount, TextUnitDto, TextUnitSearcher, TranslationStatus,
};
use crate::error::{Error, Result};

/// A text unit in one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnitVariant {
    /// Text unit identity.
    pub text_unit_id: TextUnitId,
    /// Owning repository.
    pub repository_id: RepositoryId,
    /// Text unit name.
    pub name: String,
    /// Locale tag.
    pub locale: String,
    /// Whether this is the repository's root (source) locale.
    pub root_locale: bool,
    /// Translation status in this locale.
    pub status: TranslationStatus,
    /// Whether the locale must be fully translated.
    pub to_be_fully_translated: bool,
    /// Word count of the source text.
    pub word_count: u64,
}

impl TextUnitVariant {
    fn matches(&self, params: &SearchParameters) -> bool {
        (params.repository_ids.is_empty() || params.repository_ids.contains(&self.repository_id))
            && (params.text_unit_ids.is_empty()
                || params.text_unit_ids.contains(&self.text_unit_id))
            && self.root_locale == params.for_root_locale
            && params.status_filter.matches(self.status)
            && params
                .to_be_fully_translated
                .map_or(true, |flag| flag == self.to_be_fully_translated)
    }

    fn to_dto(&self) -> TextUnitDto {
        TextUnitDto {
            text_unit_id: self.text_unit_id,
            repository_id: self.repository_id,
            name: self.name.clone(),
            locale: self.locale.clone(),
            status: self.status,
            word_count: self.word_count,
        }
    }
}

/// In-memory searcher for testing.
///
/// ## Example
///
/// ```rust
/// use tally_core::{RepositoryId, TextUnitId};
/// use tally_flow::search::memory::InMemoryTextUnitSearcher;
/// use tally_flow::search::TranslationStatus;
///
/// let searcher = InMemoryTextUnitSearcher::new();
/// searcher
///     .add_text_unit(RepositoryId::new(1), TextUnitId::new(10), "greeting", 2)
///     .unwrap();
/// searcher
///     .add_translation(TextUnitId::new(10), "fr-FR", TranslationStatus::Approved, true)
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryTextUnitSearcher {
    variants: RwLock<Vec<TextUnitVariant>>,
    search_calls: AtomicUsize,
}

/// Converts a lock poison error to a search error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::search("searcher lock poisoned")
}

impl InMemoryTextUnitSearcher {
    /// Root locale used by [`Self::add_text_unit`].
    pub const ROOT_LOCALE: &'static str = "en";

    /// Creates an empty searcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a raw variant.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn add_variant(&self, variant: TextUnitVariant) -> Result<()> {
        self.variants.write().map_err(poison_err)?.push(variant);
        Ok(())
    }

    /// Indexes a text unit in the root locale.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn add_text_unit(
        &self,
        repository_id: RepositoryId,
        text_unit_id: TextUnitId,
        name: impl Into<String>,
        word_count: u64,
    ) -> Result<()> {
        self.add_variant(TextUnitVariant {
            text_unit_id,
            repository_id,
            name: name.into(),
            locale: Self::ROOT_LOCALE.to_string(),
            root_locale: true,
            status: TranslationStatus::Approved,
            to_be_fully_translated: false,
            word_count,
        })
    }

    /// Indexes a target-locale variant of an existing text unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the text unit has no root variant or the lock is poisoned.
    pub fn add_translation(
        &self,
        text_unit_id: TextUnitId,
        locale: impl Into<String>,
        status: TranslationStatus,
        to_be_fully_translated: bool,
    ) -> Result<()> {
        let mut variants = self.variants.write().map_err(poison_err)?;
        let Some(root) = variants
            .iter()
            .find(|v| v.text_unit_id == text_unit_id && v.root_locale)
            .cloned()
        else {
            return Err(Error::search(format!("text unit {text_unit_id} is not indexed")));
        };
        variants.push(TextUnitVariant {
            locale: locale.into(),
            root_locale: false,
            status,
            to_be_fully_translated,
            ..root
        });
        Ok(())
    }

    /// Changes the status of a target-locale variant.
    ///
    /// Returns false if no such variant exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_status(
        &self,
        text_unit_id: TextUnitId,
        locale: &str,
        status: TranslationStatus,
    ) -> Result<bool> {
        let mut variants = self.variants.write().map_err(poison_err)?;
        let mut updated = false;
        for variant in variants
            .iter_mut()
            .filter(|v| v.text_unit_id == text_unit_id && !v.root_locale && v.locale == locale)
        {
            variant.status = status;
            updated = true;
        }
        Ok(updated)
    }

    /// Removes every variant of a text unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn remove_text_unit(&self, text_unit_id: TextUnitId) -> Result<()> {
        self.variants
            .write()
            .map_err(poison_err)?
            .retain(|v| v.text_unit_id != text_unit_id);
        Ok(())
    }

    /// Returns how many `search` calls were served.
    #[must_use]
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TextUnitSearcher for InMemoryTextUnitSearcher {
    async fn search(&self, params: &SearchParameters) -> Result<Vec<TextUnitDto>> {
        self.search_calls.fetch_add(1, Ordering::Relaxed);
        let variants = self.variants.read().map_err(poison_err)?;
        Ok(variants
            .iter()
            .filter(|v| v.matches(params))
            .map(TextUnitVariant::to_dto)
            .collect())
    }

    async fn count_text_unit_and_word_count(
        &self,
        params: &SearchParameters,
    ) -> Result<TextUnitAndWordCount> {
        let variants = self.variants.read().map_err(poison_err)?;
        Ok(variants
            .iter()
            .filter(|v| v.matches(params))
            .fold(TextUnitAndWordCount::default(), |acc, v| TextUnitAndWordCount {
                text_unit_count: acc.text_unit_count + 1,
                word_count: acc.word_count + v.word_count,
            }))
    }
}
