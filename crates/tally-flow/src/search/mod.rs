//! Text-unit search collaborator.
//!
//! The reconciler never evaluates translation state itself. It asks a
//! [`TextUnitSearcher`] for the text units of a branch and for unit/word
//! counts under a status filter, and only aggregates the answers.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tally_core::{RepositoryId, TextUnitId};

use crate::error::Result;

/// Translation status of a text unit in one locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranslationStatus {
    /// No translation exists yet.
    Untranslated,
    /// A translation exists but must be redone.
    TranslationNeeded,
    /// A translation exists and awaits review.
    ReviewNeeded,
    /// The translation is approved.
    Approved,
}

impl TranslationStatus {
    /// Returns true if the unit still requires translation work.
    #[must_use]
    pub const fn is_for_translation(self) -> bool {
        matches!(self, Self::Untranslated | Self::TranslationNeeded)
    }
}

/// Status filter applied by a search or count query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusFilter {
    /// No status restriction.
    #[default]
    All,
    /// Units that still require translation.
    ForTranslation,
    /// Units with a translation (reviewed or not).
    Translated,
    /// Units without any translation.
    Untranslated,
}

impl StatusFilter {
    /// Returns true if a unit in the given status passes the filter.
    #[must_use]
    pub const fn matches(self, status: TranslationStatus) -> bool {
        match self {
            Self::All => true,
            Self::ForTranslation => status.is_for_translation(),
            Self::Translated => matches!(
                status,
                TranslationStatus::ReviewNeeded | TranslationStatus::Approved
            ),
            Self::Untranslated => matches!(status, TranslationStatus::Untranslated),
        }
    }
}

/// Parameters of a search or count query.
///
/// Empty id lists mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParameters {
    /// Restrict to these repositories.
    pub repository_ids: Vec<RepositoryId>,
    /// Restrict to these text units.
    pub text_unit_ids: Vec<TextUnitId>,
    /// Search the root (source) locale instead of the target locales.
    pub for_root_locale: bool,
    /// Status restriction.
    pub status_filter: StatusFilter,
    /// Restrict to locales that must (or must not) be fully translated.
    pub to_be_fully_translated: Option<bool>,
}

impl SearchParameters {
    /// Creates unrestricted parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the query to a repository.
    #[must_use]
    pub fn with_repository_id(mut self, repository_id: RepositoryId) -> Self {
        self.repository_ids.push(repository_id);
        self
    }

    /// Restricts the query to the given text units.
    #[must_use]
    pub fn with_text_unit_ids(mut self, ids: impl IntoIterator<Item = TextUnitId>) -> Self {
        self.text_unit_ids.extend(ids);
        self
    }

    /// Scopes the query to the root locale.
    #[must_use]
    pub const fn for_root_locale(mut self) -> Self {
        self.for_root_locale = true;
        self
    }

    /// Sets the status filter.
    #[must_use]
    pub const fn with_status_filter(mut self, status_filter: StatusFilter) -> Self {
        self.status_filter = status_filter;
        self
    }

    /// Restricts to locales whose fully-translated flag equals `value`.
    #[must_use]
    pub const fn with_to_be_fully_translated(mut self, value: bool) -> Self {
        self.to_be_fully_translated = Some(value);
        self
    }
}

/// A text unit in one locale, as returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextUnitDto {
    /// Text unit identity.
    pub text_unit_id: TextUnitId,
    /// Owning repository.
    pub repository_id: RepositoryId,
    /// Text unit name (the string key).
    pub name: String,
    /// Locale tag of this variant.
    pub locale: String,
    /// Translation status in this locale.
    pub status: TranslationStatus,
    /// Word count of the source text.
    pub word_count: u64,
}

/// Result of a count query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextUnitAndWordCount {
    /// Number of matching units.
    pub text_unit_count: u64,
    /// Sum of word counts of matching units.
    pub word_count: u64,
}

/// Authoritative source of text units and their translation counts.
#[async_trait]
pub trait TextUnitSearcher: Send + Sync {
    /// Returns the text units matching the parameters.
    async fn search(&self, params: &SearchParameters) -> Result<Vec<TextUnitDto>>;

    /// Counts the text units (and their words) matching the parameters.
    async fn count_text_unit_and_word_count(
        &self,
        params: &SearchParameters,
    ) -> Result<TextUnitAndWordCount>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_translation_filter_matches_untranslated_and_needed() {
        let filter = StatusFilter::ForTranslation;
        assert!(filter.matches(TranslationStatus::Untranslated));
        assert!(filter.matches(TranslationStatus::TranslationNeeded));
        assert!(!filter.matches(TranslationStatus::ReviewNeeded));
        assert!(!filter.matches(TranslationStatus::Approved));
    }

    #[test]
    fn builder_accumulates_restrictions() {
        let params = SearchParameters::new()
            .with_repository_id(RepositoryId::new(4))
            .with_text_unit_ids([TextUnitId::new(1), TextUnitId::new(2)])
            .for_root_locale()
            .with_status_filter(StatusFilter::ForTranslation)
            .with_to_be_fully_translated(true);

        assert_eq!(params.repository_ids, vec![RepositoryId::new(4)]);
        assert_eq!(params.text_unit_ids.len(), 2);
        assert!(params.for_root_locale);
        assert_eq!(params.status_filter, StatusFilter::ForTranslation);
        assert_eq!(params.to_be_fully_translated, Some(true));
    }
}
