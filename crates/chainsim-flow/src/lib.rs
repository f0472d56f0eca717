//! # chainsim-flow
//!
//! Asynchronous simulation jobs for supply-chain what-if scenarios.
//!
//! A caller starts a simulation for a stored [`Scenario`](scenario::Scenario)
//! and gets a job id back immediately. A background task then drives the job:
//!
//! - **Submission**: the scenario is sent to an external compute service
//!   when one is configured, otherwise a local placeholder handle is used
//! - **Polling**: the remote run is queried at a fixed interval within a
//!   bounded budget; UNKNOWN means "keep polling"
//! - **Estimation**: the result comes from the first tier that succeeds out
//!   of remote output, a warehouse-derived estimate, and a synthetic baseline
//!
//! ## Guarantees
//!
//! - **No stuck jobs**: every job reaches COMPLETED or FAILED within the poll
//!   budget plus estimation time
//! - **Results follow completion**: a result is readable only for a
//!   COMPLETED job
//! - **Degraded, not down**: missing compute or warehouse configuration
//!   lowers result fidelity but never fails a job
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chainsim_flow::compute::memory::ScriptedComputeClient;
//! use chainsim_flow::prelude::*;
//! use chainsim_flow::store::memory::InMemoryStore;
//!
//! # async fn example() -> Result<()> {
//! let store = Arc::new(InMemoryStore::new());
//! let scenario = Scenario::new("Q1 Disruption");
//! store.save_scenario(&scenario).await?;
//!
//! let estimator = ResultEstimator::new(Warehouse::synthetic_only());
//! let orchestrator = JobOrchestrator::new(
//!     Collaborators::with_store(store, Arc::new(ScriptedComputeClient::not_configured()), estimator),
//!     PollConfig::default(),
//! );
//!
//! let job_id = orchestrator.start_simulation(scenario.id).await?;
//! orchestrator.wait_for_job(job_id).await?;
//! let result = orchestrator.get_result(job_id).await?;
//! println!("total cost {}", result.total_cost);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod compute;
pub mod config;
pub mod error;
pub mod estimate;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod poll;
pub mod result;
pub mod scenario;
pub mod store;
pub mod warehouse;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::compute::{ComputeClient, ComputeError, RemoteRunState, RunHandle};
    pub use crate::config::SimulationConfig;
    pub use crate::error::{Error, Result};
    pub use crate::estimate::ResultEstimator;
    pub use crate::job::{JobStatus, SimulationJob};
    pub use crate::metrics::JobMetrics;
    pub use crate::orchestrator::{Collaborators, JobOrchestrator};
    pub use crate::poll::{PollConfig, PollOutcome};
    pub use crate::result::{ResultSource, SimulationMetrics, SimulationResult};
    pub use crate::scenario::{Scenario, ScenarioStatus};
    pub use crate::store::{CasResult, JobStore, ResultStore, ScenarioStore};
    pub use crate::warehouse::{Warehouse, WarehouseBackend, WarehouseSnapshot};
}
