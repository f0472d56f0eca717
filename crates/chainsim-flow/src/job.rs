//! Simulation job tracking.
//!
//! A job is one asynchronous execution attempt of a scenario's simulation.
//! Its status moves strictly forward:
//!
//! ```text
//! PENDING ──► RUNNING ──► COMPLETED
//!                   └───► FAILED
//! ```
//!
//! Nothing leaves a terminal state, and a terminal job is never resumed.
//! The transition methods stamp the lifecycle timestamps so callers cannot
//! forget to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chainsim_core::{JobId, ScenarioId};

use crate::error::{Error, Result};

/// Job state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created, execution task not started yet.
    #[default]
    Pending,
    /// Execution task owns the job.
    Running,
    /// A result was produced and persisted.
    Completed,
    /// The job ended without a result.
    Failed,
}

impl JobStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the transition from self to target is valid.
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::Pending => matches!(target, Self::Running),
            Self::Running => matches!(target, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed => false,
        }
    }

    /// Lowercase label for metrics.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Progress is advisory only; these are the checkpoints the orchestrator reports.
pub mod progress {
    /// Job record created.
    pub const CREATED: u8 = 0;
    /// Execution task started.
    pub const STARTED: u8 = 10;
    /// Remote run submitted (or local placeholder assigned).
    pub const SUBMITTED: u8 = 25;
    /// Remote run finished; deriving the result.
    pub const ESTIMATING: u8 = 75;
    /// Result persisted.
    pub const DONE: u8 = 100;
}

/// A simulation job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationJob {
    /// Unique job identifier.
    pub id: JobId,
    /// Scenario being simulated.
    pub scenario_id: ScenarioId,
    /// Current status.
    pub status: JobStatus,
    /// Advisory progress, 0-100.
    pub progress: u8,
    /// Remote run handle once submission happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_run_id: Option<String>,
    /// Human-readable failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the execution task took ownership.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SimulationJob {
    /// Creates a new pending job for a scenario.
    #[must_use]
    pub fn new(scenario_id: ScenarioId) -> Self {
        Self {
            id: JobId::generate(),
            scenario_id,
            status: JobStatus::Pending,
            progress: progress::CREATED,
            external_run_id: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Returns true if the job is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transitions to a new status, stamping lifecycle timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is invalid.
    #[tracing::instrument(skip(self), fields(job_id = %self.id, from = %self.status, to = %target))]
    pub fn transition_to(&mut self, target: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: self.status.to_string(),
                to: target.to_string(),
                reason: "invalid job state transition".into(),
            });
        }

        let now = Utc::now();
        match target {
            JobStatus::Running => {
                self.started_at = Some(now);
                self.progress = progress::STARTED;
            }
            JobStatus::Completed => {
                self.completed_at = Some(now);
                self.progress = progress::DONE;
            }
            JobStatus::Failed => {
                self.completed_at = Some(now);
            }
            JobStatus::Pending => {}
        }

        self.status = target;
        Ok(())
    }

    /// Marks the job FAILED with a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not RUNNING.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition_to(JobStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Records advisory progress, never moving it backwards or past 100.
    pub fn advance_progress(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(progress::DONE));
    }
}
