//! Shared test utilities for tally integration tests.
//!
//! This crate provides:
//! - [`TestWorld`]: In-memory store, searcher and scheduler seeded per test
//! - [`TracingScheduler`]: Scheduler wrapper with operation recording and failure injection
//! - [`FailingSearcher`]: Searcher wrapper failing on chosen text units
//! - Custom assertion helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_test_utils::{assert_statistic_matches_rows, TestWorld};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let world = TestWorld::new();
//!     let branch = world.branch(10, "feature-x");
//!     world.index_text_unit(1, &[TranslationStatus::Untranslated]);
//!     world.map_text_units(&branch, [1]);
//!     let statistic = world.reconciler().reconcile(&branch).await.unwrap();
//!     assert_statistic_matches_rows(&statistic, &world.rows(&branch));
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;
pub mod scheduler;
pub mod search;

pub use assertions::*;
pub use fixtures::*;
pub use scheduler::*;
pub use search::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tally=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
