//! Observability infrastructure for tally.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors shared by every component.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::Error;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else if s.eq_ignore_ascii_case("pretty") {
            Ok(Self::Pretty)
        } else {
            Err(Error::InvalidInput(format!(
                "unknown log format '{s}', expected 'json' or 'pretty'"
            )))
        }
    }
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `tally_flow=debug`)
///
/// # Example
///
/// ```rust
/// use tally_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for statistics reconciliation with standard fields.
///
/// # Example
///
/// ```rust
/// use tally_core::observability::reconcile_span;
///
/// let span = reconcile_span("reconcile_branch", 3, 42);
/// let _guard = span.enter();
/// // ... reconcile the branch
/// ```
#[must_use]
pub fn reconcile_span(
    operation: &str,
    repository_id: impl Display,
    branch_id: impl Display,
) -> Span {
    tracing::info_span!(
        "reconcile",
        op = operation,
        repository_id = %repository_id,
        branch_id = %branch_id,
    )
}

/// Creates a span for scheduler registry operations.
#[must_use]
pub fn scheduler_span(operation: &str, group: &str) -> Span {
    tracing::info_span!("scheduler", op = operation, group = group)
}
