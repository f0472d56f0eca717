//! Wiring from configuration to a running orchestrator.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use chainsim_core::JobId;
use chainsim_flow::compute::jobs_api::JobsApiClient;
use chainsim_flow::config::SimulationConfig;
use chainsim_flow::estimate::ResultEstimator;
use chainsim_flow::job::SimulationJob;
use chainsim_flow::orchestrator::{Collaborators, JobOrchestrator};
use chainsim_flow::poll::PollConfig;
use chainsim_flow::result::SimulationResult;
use chainsim_flow::scenario::Scenario;
use chainsim_flow::store::ScenarioStore;
use chainsim_flow::store::memory::InMemoryStore;
use chainsim_flow::warehouse::Warehouse;
use chainsim_flow::warehouse::sql_api::SqlApiWarehouse;

use crate::Cli;

/// Applies command-line overrides on top of environment configuration.
///
/// # Errors
///
/// Returns an error if an override is invalid.
pub fn apply_overrides(mut config: SimulationConfig, cli: &Cli) -> Result<SimulationConfig> {
    if let Some(secs) = cli.poll_interval {
        config.poll = PollConfig::new(Duration::from_secs(secs), config.poll.max_attempts)?;
    }
    if let Some(seed) = cli.seed {
        config.estimator_seed = Some(seed);
    }
    Ok(config)
}

/// A process-local simulation runtime.
#[derive(Debug)]
pub struct Runtime {
    store: Arc<InMemoryStore>,
    orchestrator: JobOrchestrator,
}

/// What one simulated scenario ended as.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// The scenario simulated.
    pub scenario: Scenario,
    /// The final job record.
    pub job: SimulationJob,
    /// The result, present only for COMPLETED jobs.
    pub result: Option<SimulationResult>,
}

impl Runtime {
    /// Builds the collaborators described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured client cannot be created.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        let compute = JobsApiClient::new(config.compute.clone())
            .context("Failed to create compute client")?;
        if compute.is_configured() {
            tracing::info!("compute service configured");
        } else {
            tracing::info!("compute service not configured; results are estimated locally");
        }

        let warehouse = match &config.warehouse {
            Some(warehouse) => Warehouse::new(Arc::new(
                SqlApiWarehouse::new(warehouse.clone()).context("Failed to create warehouse client")?,
            )),
            None => {
                tracing::info!("warehouse not configured; using synthetic data");
                Warehouse::synthetic_only()
            }
        };

        let mut estimator = ResultEstimator::new(warehouse);
        if let Some(seed) = config.estimator_seed {
            estimator = estimator.with_seed(seed);
        }

        let store = Arc::new(InMemoryStore::new());
        let orchestrator = JobOrchestrator::new(
            Collaborators::with_store(Arc::clone(&store), Arc::new(compute), estimator),
            config.poll,
        );
        Ok(Self {
            store,
            orchestrator,
        })
    }

    /// The orchestrator driving this runtime's jobs.
    #[must_use]
    pub const fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }

    /// Simulates every scenario concurrently and waits for all of them.
    ///
    /// Ctrl-C cancels the in-flight jobs; their outcomes are still reported.
    ///
    /// # Errors
    ///
    /// Returns an error if a scenario cannot be stored or started.
    pub async fn simulate(&self, scenarios: Vec<Scenario>) -> Result<Vec<Outcome>> {
        let mut started: Vec<(Scenario, JobId)> = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            self.store.save_scenario(&scenario).await?;
            let job_id = self.orchestrator.start_simulation(scenario.id).await?;
            tracing::info!(%job_id, scenario = %scenario.name, "simulation started");
            started.push((scenario, job_id));
        }

        let wait_all = async {
            for (_, job_id) in &started {
                self.orchestrator.wait_for_job(*job_id).await?;
            }
            Ok::<_, chainsim_flow::error::Error>(())
        };

        tokio::select! {
            waited = wait_all => waited?,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for ctrl-c")?;
                eprintln!("Interrupted; cancelling simulations...");
                self.orchestrator.shutdown().await;
            }
        }

        let mut outcomes = Vec::with_capacity(started.len());
        for (scenario, job_id) in started {
            let job = self.orchestrator.get_job(job_id).await?;
            let result = self.orchestrator.get_result(job_id).await.ok();
            outcomes.push(Outcome {
                scenario,
                job,
                result,
            });
        }
        Ok(outcomes)
    }
}
