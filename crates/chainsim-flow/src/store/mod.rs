//! Pluggable storage for simulation state.
//!
//! Three collaborator traits:
//!
//! - [`JobStore`]: job records, keyed by job ID, with CAS status updates
//! - [`ResultStore`]: simulation results, owned 1:1 by a job
//! - [`ScenarioStore`]: read access to caller-owned scenarios
//!
//! ## Design Principles
//!
//! - **CAS semantics**: Job updates name the status they expect to replace, so
//!   at most one writer can move a job record forward
//! - **Consistent reads**: Readers always see a whole record, never a partial update
//! - **Testability**: [`memory::InMemoryStore`] implements all three traits

pub mod memory;

use async_trait::async_trait;

use chainsim_core::{JobId, ScenarioId};

use crate::error::Result;
use crate::job::{JobStatus, SimulationJob};
use crate::result::SimulationResult;
use crate::scenario::Scenario;

/// Result of a compare-and-swap operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasResult {
    /// Operation succeeded.
    Success,
    /// Entity not found.
    NotFound,
    /// Status didn't match expected value.
    StateMismatch {
        /// The actual status that was found.
        actual: JobStatus,
    },
}

impl CasResult {
    /// Returns true if the operation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the entity was not found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Durable record of job state.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync`; status queries run concurrently with the
/// job's own task.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a new job.
    ///
    /// # Errors
    ///
    /// Returns an error if a job with the same ID already exists.
    async fn insert_job(&self, job: &SimulationJob) -> Result<()>;

    /// Gets a job by ID.
    ///
    /// Returns `None` if the job does not exist.
    async fn get_job(&self, job_id: &JobId) -> Result<Option<SimulationJob>>;

    /// Replaces a job record if its stored status still equals `expected`.
    ///
    /// # Returns
    ///
    /// - `CasResult::Success` if the record was replaced
    /// - `CasResult::NotFound` if the job doesn't exist
    /// - `CasResult::StateMismatch` if another writer moved the job first
    async fn cas_job(&self, job: &SimulationJob, expected: JobStatus) -> Result<CasResult>;
}

/// Authoritative store of simulation results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Saves the result owned by `job_id`, replacing any previous one.
    async fn save_result(&self, job_id: &JobId, result: &SimulationResult) -> Result<()>;

    /// Gets the result owned by a job.
    async fn get_result(&self, job_id: &JobId) -> Result<Option<SimulationResult>>;

    /// Removes the result owned by a job.
    ///
    /// Used to undo a save when the job could not be marked COMPLETED.
    async fn delete_result(&self, job_id: &JobId) -> Result<()>;

    /// Returns every stored result belonging to one of `scenario_ids`.
    ///
    /// Order is unspecified. A stored result may belong to a job that has not
    /// reached COMPLETED yet; callers check the owning job before exposing it.
    async fn scenario_results(&self, scenario_ids: &[ScenarioId]) -> Result<Vec<SimulationResult>>;
}

/// Read access to caller-owned scenarios.
#[async_trait]
pub trait ScenarioStore: Send + Sync {
    /// Gets a scenario by ID.
    async fn get_scenario(&self, scenario_id: &ScenarioId) -> Result<Option<Scenario>>;

    /// Saves a scenario (insert or update).
    async fn save_scenario(&self, scenario: &Scenario) -> Result<()>;
}
