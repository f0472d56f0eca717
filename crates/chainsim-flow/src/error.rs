//! Error types for the simulation orchestration domain.

use chainsim_core::{JobId, ScenarioId};

/// The result type used throughout chainsim-flow.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in orchestration operations.
///
/// Caller-facing operations only ever surface the typed not-found and
/// invalid-state variants; infrastructure failures inside a job's task are
/// converted into a FAILED job record instead of being returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The scenario does not exist.
    #[error("scenario not found: {scenario_id}")]
    ScenarioNotFound {
        /// The scenario ID that was not found.
        scenario_id: ScenarioId,
    },

    /// The job does not exist.
    #[error("job not found: {job_id}")]
    JobNotFound {
        /// The job ID that was not found.
        job_id: JobId,
    },

    /// The job has no completed result.
    #[error("result not found for job: {job_id}")]
    ResultNotFound {
        /// The job whose result was requested.
        job_id: JobId,
    },

    /// An invalid state transition was attempted.
    #[error("invalid state transition: {from} -> {to} ({reason})")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
        /// The reason the transition is invalid.
        reason: String,
    },

    /// Invalid caller input (malformed scenario, bad configuration value).
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// The remote compute service failed the run or could not be reached.
    #[error("compute error: {message}")]
    Compute {
        /// Description of the compute failure.
        message: String,
    },

    /// An estimation tier could not produce a result.
    #[error("estimation failed: {message}")]
    Estimation {
        /// Description of the estimation failure.
        message: String,
    },

    /// The job was cancelled before reaching a result.
    #[error("cancelled")]
    Cancelled,

    /// An error from chainsim-core.
    #[error("core error: {0}")]
    Core(#[from] chainsim_core::Error),
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

    /// Creates a new storage error with a source.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new compute error.
    #[must_use]
    pub fn compute(message: impl Into<String>) -> Self {
        Self::Compute {
            message: message.into(),
        }
    }

    /// Creates a new estimation error.
    #[must_use]
    pub fn estimation(message: impl Into<String>) -> Self {
        Self::Estimation {
            message: message.into(),
        }
    }

    /// Returns true for the caller-facing not-found conditions.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ScenarioNotFound { .. } | Self::JobNotFound { .. } | Self::ResultNotFound { .. }
        )
    }
}
