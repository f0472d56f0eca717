//! Remote batch compute abstraction.
//!
//! This module provides:
//!
//! - [`ComputeClient`]: Trait for submitting a scenario run and querying its state
//! - [`RunSubmission`]: Serializable job specification sent to the compute service
//! - [`RemoteRunState`]: Classified life-cycle state of a remote run
//! - [`ComputeError`]: Submission failures, split into "not configured" and "unavailable"
//!
//! ## Design Principles
//!
//! - **Stateless**: Clients hold configuration only; every call is safe to retry
//! - **Never fatal on read**: State queries map transport/protocol failures to
//!   [`RemoteRunState::Unknown`] so the poll loop keeps going within its budget
//! - **Absence is a mode**: A client without endpoint or credentials reports
//!   [`ComputeError::NotConfigured`], which the orchestrator treats as expected

pub mod jobs_api;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use chainsim_core::ScenarioId;

/// Default remote entry point for the simulation.
pub const DEFAULT_SIMULATION_SCRIPT: &str = "dbfs:/simulations/monte_carlo_simulation.py";

/// Task key used for the single task of a simulation run.
pub const SIMULATION_TASK_KEY: &str = "simulation_task";

/// Prefix of locally synthesized run handles.
pub const PLACEHOLDER_PREFIX: &str = "local-";

/// Opaque identifier of work submitted to the compute service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunHandle(String);

impl RunHandle {
    /// Wraps a handle returned by the compute service.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthesizes a local handle for runs that never reached the service.
    #[must_use]
    pub fn placeholder(scenario_id: &ScenarioId) -> Self {
        Self(format!(
            "{PLACEHOLDER_PREFIX}{scenario_id}-{}",
            chrono::Utc::now().timestamp_millis()
        ))
    }

    /// Returns true if this handle was synthesized locally.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }

    /// Returns the raw handle string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Life-cycle state of a remote run, as seen by the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteRunState {
    /// Accepted, not started.
    Pending,
    /// Executing.
    Running,
    /// Finished; output (if any) is available.
    Terminated,
    /// The service decided not to run it.
    Skipped,
    /// The service failed the run.
    InternalError,
    /// Could not be determined (network, auth or protocol failure).
    Unknown,
}

impl RemoteRunState {
    /// Classifies a compute-service life-cycle state string.
    ///
    /// Intermediate states the service reports beyond the core five
    /// (`QUEUED`, `BLOCKED`, `WAITING_FOR_RETRY`, `TERMINATING`) fold into
    /// PENDING or RUNNING; anything else is UNKNOWN.
    #[must_use]
    pub fn from_life_cycle(state: &str) -> Self {
        match state.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "QUEUED" | "BLOCKED" | "WAITING_FOR_RETRY" => Self::Pending,
            "RUNNING" | "TERMINATING" => Self::Running,
            "TERMINATED" => Self::Terminated,
            "SKIPPED" => Self::Skipped,
            "INTERNAL_ERROR" => Self::InternalError,
            _ => Self::Unknown,
        }
    }

    /// Returns true if the remote service explicitly failed the run.
    #[must_use]
    pub const fn is_remote_failure(&self) -> bool {
        matches!(self, Self::Skipped | Self::InternalError)
    }

    /// Lowercase label for metrics.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Terminated => "terminated",
            Self::Skipped => "skipped",
            Self::InternalError => "internal_error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RemoteRunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Terminated => write!(f, "TERMINATED"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::InternalError => write!(f, "INTERNAL_ERROR"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Submission failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    /// No endpoint or credentials; the expected degraded mode.
    #[error("compute service not configured")]
    NotConfigured,
    /// Unreachable, unauthenticated, or the spec was rejected.
    #[error("compute service unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

impl ComputeError {
    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Ephemeral compute resource provisioned for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemeralCluster {
    /// Runtime version.
    pub spark_version: String,
    /// Node type.
    pub node_type_id: String,
    /// Worker count (0 = single node).
    pub num_workers: u32,
    /// Idle minutes before the resource shuts down.
    pub autotermination_minutes: u32,
}

impl Default for EphemeralCluster {
    fn default() -> Self {
        Self {
            spark_version: "13.3.x-scala2.12".to_string(),
            node_type_id: "i3.xlarge".to_string(),
            num_workers: 0,
            autotermination_minutes: 30,
        }
    }
}

/// Where a run executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeTarget {
    /// A pre-designated, already running resource.
    Existing {
        /// Resource identifier.
        cluster_id: String,
    },
    /// A resource provisioned on demand.
    Ephemeral(EphemeralCluster),
}

/// Script invocation for the simulation task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptTask {
    /// Script location on the compute service.
    pub python_file: String,
    /// Command-line parameters.
    pub parameters: Vec<String>,
}

/// One task of a run submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTask {
    /// Task key within the run.
    pub task_key: String,
    /// Script to execute.
    pub spark_python_task: ScriptTask,
    /// Existing resource to run on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_cluster_id: Option<String>,
    /// Resource to provision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_cluster: Option<EphemeralCluster>,
}

/// Job specification sent to the compute service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSubmission {
    /// Deterministic run name derived from the scenario ID.
    pub run_name: String,
    /// Tasks to execute (always exactly one).
    pub tasks: Vec<SubmitTask>,
}

impl RunSubmission {
    /// Builds the specification for simulating a scenario.
    #[must_use]
    pub fn for_scenario(scenario_id: &ScenarioId, script: &str, target: ComputeTarget) -> Self {
        let (existing_cluster_id, new_cluster) = match target {
            ComputeTarget::Existing { cluster_id } => (Some(cluster_id), None),
            ComputeTarget::Ephemeral(cluster) => (None, Some(cluster)),
        };

        Self {
            run_name: run_name(scenario_id),
            tasks: vec![SubmitTask {
                task_key: SIMULATION_TASK_KEY.to_string(),
                spark_python_task: ScriptTask {
                    python_file: script.to_string(),
                    parameters: vec!["--scenario-id".to_string(), scenario_id.to_string()],
                },
                existing_cluster_id,
                new_cluster,
            }],
        }
    }
}

/// Deterministic run name for a scenario.
#[must_use]
pub fn run_name(scenario_id: &ScenarioId) -> String {
    format!("Supply Chain Simulation - Scenario {scenario_id}")
}

/// Client for the remote batch compute service.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` so one client can serve every job task.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// Submits a simulation run for a scenario.
    ///
    /// # Errors
    ///
    /// - [`ComputeError::NotConfigured`] if endpoint or credentials are absent
    /// - [`ComputeError::Unavailable`] if the service is unreachable,
    ///   rejects the credentials, or rejects the specification
    async fn submit(&self, scenario_id: &ScenarioId) -> Result<RunHandle, ComputeError>;

    /// Queries the state of a submitted run.
    ///
    /// Never fails: transport and protocol failures map to
    /// [`RemoteRunState::Unknown`].
    async fn get_run_state(&self, handle: &RunHandle) -> RemoteRunState;
}
