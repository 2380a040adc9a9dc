//! Runtime configuration for reconciliation services.
//!
//! Values come from the process environment; every value has a default and
//! invalid values are rejected rather than silently replaced.

use std::time::Duration;

use tally_core::observability::{init_logging, LogFormat};

use crate::error::{Error, Result};
use crate::model::PRIMARY_BRANCH;

const ENV_PRIMARY_BRANCH: &str = "TALLY_PRIMARY_BRANCH";
const ENV_BRANCH_CONCURRENCY: &str = "TALLY_BRANCH_CONCURRENCY";
const ENV_SCHEDULER_START_DELAY_SECS: &str = "TALLY_SCHEDULER_START_DELAY_SECS";
const ENV_LOG_FORMAT: &str = "TALLY_LOG_FORMAT";

const DEFAULT_BRANCH_CONCURRENCY: usize = 4;
const DEFAULT_SCHEDULER_START_DELAY_SECS: u64 = 2;

/// Configuration shared by the batch driver and the scheduler startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Name of the primary branch, never reconciled.
    pub primary_branch_name: String,
    /// Maximum number of branches reconciled concurrently within one batch.
    pub branch_concurrency: usize,
    /// Delay between the end of registry cleanup and the first trigger firing.
    pub scheduler_start_delay: Duration,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            primary_branch_name: PRIMARY_BRANCH.to_string(),
            branch_concurrency: DEFAULT_BRANCH_CONCURRENCY,
            scheduler_start_delay: Duration::from_secs(DEFAULT_SCHEDULER_START_DELAY_SECS),
            log_format: LogFormat::default(),
        }
    }
}

impl ReconcileConfig {
    /// Loads config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a value is present but invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads config with a custom environment source.
    ///
    /// This entry point is test-friendly and accepts a key lookup function.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a value is present but invalid.
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let primary_branch_name = match get_env(ENV_PRIMARY_BRANCH) {
            Some(raw) if raw.trim().is_empty() => {
                return Err(Error::configuration(format!(
                    "{ENV_PRIMARY_BRANCH} must not be empty"
                )));
            }
            Some(raw) => raw.trim().to_string(),
            None => defaults.primary_branch_name,
        };

        let branch_concurrency = match get_env(ENV_BRANCH_CONCURRENCY) {
            Some(raw) => {
                let parsed = parse_u64(ENV_BRANCH_CONCURRENCY, &raw)?;
                if parsed == 0 {
                    return Err(Error::configuration(format!(
                        "{ENV_BRANCH_CONCURRENCY} must be greater than zero"
                    )));
                }
                usize::try_from(parsed).map_err(|_| {
                    Error::configuration(format!(
                        "{ENV_BRANCH_CONCURRENCY} value {parsed} exceeds supported range"
                    ))
                })?
            }
            None => defaults.branch_concurrency,
        };

        let scheduler_start_delay = match get_env(ENV_SCHEDULER_START_DELAY_SECS) {
            Some(raw) => Duration::from_secs(parse_u64(ENV_SCHEDULER_START_DELAY_SECS, &raw)?),
            None => defaults.scheduler_start_delay,
        };

        let log_format = match get_env(ENV_LOG_FORMAT) {
            Some(raw) => raw
                .trim()
                .parse::<LogFormat>()
                .map_err(|e| Error::configuration(format!("{ENV_LOG_FORMAT}: {e}")))?,
            None => defaults.log_format,
        };

        Ok(Self {
            primary_branch_name,
            branch_concurrency,
            scheduler_start_delay,
            log_format,
        })
    }

    /// Installs the global log subscriber in the configured format.
    ///
    /// Call once at process startup, before reconciling or starting the
    /// scheduler. Later calls are no-ops.
    pub fn init_logging(&self) {
        init_logging(self.log_format);
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        Error::configuration(format!("{key} must be a non-negative integer, got '{raw}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ReconcileConfig::from_env_with(env(&[])).unwrap();
        assert_eq!(config, ReconcileConfig::default());
        assert_eq!(config.primary_branch_name, "master");
        assert_eq!(config.scheduler_start_delay, Duration::from_secs(2));
    }

    #[test]
    fn reads_overrides() {
        let config = ReconcileConfig::from_env_with(env(&[
            (ENV_PRIMARY_BRANCH, "main"),
            (ENV_BRANCH_CONCURRENCY, "8"),
            (ENV_SCHEDULER_START_DELAY_SECS, "0"),
            (ENV_LOG_FORMAT, "json"),
        ]))
        .unwrap();

        assert_eq!(config.primary_branch_name, "main");
        assert_eq!(config.branch_concurrency, 8);
        assert_eq!(config.scheduler_start_delay, Duration::ZERO);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn configured_log_format_installs_subscriber_once() {
        let json = ReconcileConfig::from_env_with(env(&[(ENV_LOG_FORMAT, "json")])).unwrap();
        json.init_logging();
        ReconcileConfig::default().init_logging();
        assert!(tracing::dispatcher::has_been_set());
    }

    #[test]
    fn rejects_unknown_log_format() {
        let err = ReconcileConfig::from_env_with(env(&[(ENV_LOG_FORMAT, "xml")])).unwrap_err();
        assert!(err.to_string().contains(ENV_LOG_FORMAT));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = ReconcileConfig::from_env_with(env(&[(ENV_BRANCH_CONCURRENCY, "0")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_BRANCH_CONCURRENCY));
    }

    #[test]
    fn rejects_garbage_delay() {
        let err =
            ReconcileConfig::from_env_with(env(&[(ENV_SCHEDULER_START_DELAY_SECS, "soon")]))
                .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn rejects_blank_primary_branch() {
        assert!(ReconcileConfig::from_env_with(env(&[(ENV_PRIMARY_BRANCH, "  ")])).is_err());
    }
}
