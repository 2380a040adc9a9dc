//! Error types for the reconciliation domain.

use std::fmt;

/// The result type used throughout tally-flow.
pub type Result<T> = std::result::Result<T, Error>;

/// Phase of the scheduler startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    /// Reading live job and trigger keys from the scheduler.
    ReadLiveKeys,
    /// Unscheduling triggers that are no longer declared.
    UnscheduleTriggers,
    /// Deleting jobs that are no longer declared.
    DeleteJobs,
    /// Registering the declared jobs and triggers.
    RegisterDeclared,
    /// Starting the scheduler.
    Start,
}

impl fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadLiveKeys => write!(f, "read_live_keys"),
            Self::UnscheduleTriggers => write!(f, "unschedule_triggers"),
            Self::DeleteJobs => write!(f, "delete_jobs"),
            Self::RegisterDeclared => write!(f, "register_declared"),
            Self::Start => write!(f, "start"),
        }
    }
}

/// Errors that can occur in reconciliation operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A text-unit search or count query failed.
    #[error("search error: {message}")]
    Search {
        /// Description of the search failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A scheduler operation failed.
    #[error("scheduler error: {message}")]
    Scheduler {
        /// Description of the scheduler failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A job or trigger definition is invalid.
    #[error("invalid definition: {message}")]
    InvalidDefinition {
        /// Description of the problem.
        message: String,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Scheduler startup was aborted; the scheduler must not fire.
    #[error("scheduler startup aborted during {phase}: {source}")]
    StartupCleanup {
        /// The phase that failed.
        phase: StartupPhase,
        /// The failure.
        #[source]
        source: Box<Error>,
    },

    /// An error from tally-core.
    #[error("core error: {0}")]
    Core(#[from] tally_core::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new search error.
    #[must_use]
    pub fn search(message: impl Into<String>) -> Self {
        Self::Search {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new scheduler error.
    #[must_use]
    pub fn scheduler(message: impl Into<String>) -> Self {
        Self::Scheduler {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new invalid definition error.
    #[must_use]
    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wraps an error as a fatal startup failure in the given phase.
    #[must_use]
    pub fn startup(phase: StartupPhase, source: Self) -> Self {
        Self::StartupCleanup {
            phase,
            source: Box::new(source),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            message: error.to_string(),
        }
    }
}
