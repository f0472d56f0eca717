//! Job lifecycle tests for the simulation orchestrator.
//!
//! Every test runs on a paused tokio clock so poll intervals elapse
//! instantly while keeping their relative timing.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use chainsim_core::{JobId, ScenarioId};
use chainsim_flow::compute::memory::ScriptedComputeClient;
use chainsim_flow::compute::{PLACEHOLDER_PREFIX, RemoteRunState};
use chainsim_flow::error::Error;
use chainsim_flow::prelude::*;
use chainsim_flow::store::memory::InMemoryStore;
use chainsim_flow::warehouse::memory::InMemoryWarehouse;

const INTERVAL: Duration = Duration::from_secs(5);

struct Harness {
    store: Arc<InMemoryStore>,
    compute: Arc<ScriptedComputeClient>,
    orchestrator: JobOrchestrator,
}

impl Harness {
    fn new(compute: ScriptedComputeClient, max_attempts: u32) -> Self {
        Self::with_warehouse(compute, max_attempts, Warehouse::synthetic_only())
    }

    fn with_warehouse(compute: ScriptedComputeClient, max_attempts: u32, warehouse: Warehouse) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let compute = Arc::new(compute);
        let estimator = ResultEstimator::new(warehouse).with_seed(11);
        let orchestrator = JobOrchestrator::new(
            Collaborators::with_store(Arc::clone(&store), compute.clone(), estimator),
            PollConfig::new(INTERVAL, max_attempts).expect("poll config"),
        );
        Self {
            store,
            compute,
            orchestrator,
        }
    }

    async fn scenario(&self, name: &str) -> ScenarioId {
        let scenario = Scenario::new(name);
        self.store
            .save_scenario(&scenario)
            .await
            .expect("save scenario");
        scenario.id
    }
}

#[tokio::test(start_paused = true)]
async fn unconfigured_compute_still_completes() {
    let h = Harness::new(ScriptedComputeClient::not_configured(), 60);
    let scenario_id = h.scenario("offline").await;

    let job_id = h.orchestrator.start_simulation(scenario_id).await.unwrap();
    let status = h.orchestrator.wait_for_job(job_id).await.unwrap();

    assert_eq!(status, JobStatus::Completed);
    let job = h.orchestrator.get_job(job_id).await.unwrap();
    assert!(job.external_run_id.unwrap().starts_with(PLACEHOLDER_PREFIX));
    assert!(job.error_message.is_none());
    assert_eq!(h.compute.poll_count().unwrap(), 0, "placeholder runs are never polled");

    let result = h.orchestrator.get_result(job_id).await.unwrap();
    assert_eq!(result.scenario_id, scenario_id);
    assert!(result.is_consistent());
}

#[tokio::test(start_paused = true)]
async fn unavailable_compute_degrades_to_local_estimate() {
    let h = Harness::new(ScriptedComputeClient::unavailable("503 Service Unavailable"), 60);
    let job_id = h
        .orchestrator
        .start_simulation(h.scenario("degraded").await)
        .await
        .unwrap();

    assert_eq!(
        h.orchestrator.wait_for_job(job_id).await.unwrap(),
        JobStatus::Completed
    );
    assert_eq!(h.compute.submissions().unwrap().len(), 1);
    assert_eq!(h.compute.poll_count().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn terminated_run_completes_with_remote_handle() {
    let h = Harness::new(
        ScriptedComputeClient::new([
            RemoteRunState::Pending,
            RemoteRunState::Running,
            RemoteRunState::Terminated,
        ]),
        60,
    );
    let job_id = h
        .orchestrator
        .start_simulation(h.scenario("remote").await)
        .await
        .unwrap();

    assert_eq!(
        h.orchestrator.wait_for_job(job_id).await.unwrap(),
        JobStatus::Completed
    );
    let job = h.orchestrator.get_job(job_id).await.unwrap();
    assert_eq!(job.external_run_id.as_deref(), Some("1"));
    assert_eq!(job.progress, 100);
    assert_eq!(h.compute.poll_count().unwrap(), 3);

    // No remote output reader is attached, so tier 2 answers.
    let result = h.orchestrator.get_result(job_id).await.unwrap();
    assert_eq!(result.source, ResultSource::Warehouse);
    assert_eq!(result.job_id, Some(job_id));
}

#[tokio::test(start_paused = true)]
async fn always_unknown_times_out_after_budget() {
    let h = Harness::new(ScriptedComputeClient::new([RemoteRunState::Unknown]), 60);
    let started = tokio::time::Instant::now();
    let job_id = h
        .orchestrator
        .start_simulation(h.scenario("silent").await)
        .await
        .unwrap();

    assert_eq!(
        h.orchestrator.wait_for_job(job_id).await.unwrap(),
        JobStatus::Failed
    );
    let elapsed = started.elapsed();
    assert!(elapsed >= INTERVAL * 59 && elapsed < INTERVAL * 60);
    assert_eq!(h.compute.poll_count().unwrap(), 60);

    let job = h.orchestrator.get_job(job_id).await.unwrap();
    assert!(job.error_message.unwrap().contains("timed out"));
    assert!(job.completed_at.is_some());
    assert!(matches!(
        h.orchestrator.get_result(job_id).await,
        Err(Error::ResultNotFound { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn remote_failure_states_fail_the_job() {
    for state in [RemoteRunState::Skipped, RemoteRunState::InternalError] {
        let h = Harness::new(
            ScriptedComputeClient::new([RemoteRunState::Running, state]),
            60,
        );
        let job_id = h
            .orchestrator
            .start_simulation(h.scenario("broken").await)
            .await
            .unwrap();

        assert_eq!(
            h.orchestrator.wait_for_job(job_id).await.unwrap(),
            JobStatus::Failed
        );
        let job = h.orchestrator.get_job(job_id).await.unwrap();
        assert!(
            job.error_message.as_deref().unwrap().contains(&state.to_string()),
            "unexpected message for {state}: {:?}",
            job.error_message
        );
        assert_eq!(h.store.result_count().unwrap(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_polling_at_next_interval() {
    let h = Harness::new(ScriptedComputeClient::new([RemoteRunState::Running]), 60);
    let job_id = h
        .orchestrator
        .start_simulation(h.scenario("long").await)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(
        h.orchestrator.get_job_status(job_id).await.unwrap(),
        JobStatus::Running
    );

    h.orchestrator.cancel_job(job_id).await.unwrap();
    // Repeated requests while the job winds down are no-ops.
    h.orchestrator.cancel_job(job_id).await.unwrap();

    assert_eq!(
        h.orchestrator.wait_for_job(job_id).await.unwrap(),
        JobStatus::Failed
    );
    let job = h.orchestrator.get_job(job_id).await.unwrap();
    assert_eq!(job.error_message.as_deref(), Some("cancelled"));
    assert!(h.compute.poll_count().unwrap() < 60);

    assert!(matches!(
        h.orchestrator.cancel_job(job_id).await,
        Err(Error::InvalidStateTransition { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn result_exists_only_for_completed_jobs() {
    let h = Harness::new(ScriptedComputeClient::new([RemoteRunState::Running]), 3);
    let job_id = h
        .orchestrator
        .start_simulation(h.scenario("pending").await)
        .await
        .unwrap();

    // PENDING and RUNNING jobs have no result.
    assert!(matches!(
        h.orchestrator.get_result(job_id).await,
        Err(Error::ResultNotFound { .. })
    ));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        h.orchestrator.get_job_status(job_id).await.unwrap(),
        JobStatus::Running
    );
    assert!(matches!(
        h.orchestrator.get_result(job_id).await,
        Err(Error::ResultNotFound { .. })
    ));

    // Budget of 3 runs out: FAILED, still no result.
    assert_eq!(
        h.orchestrator.wait_for_job(job_id).await.unwrap(),
        JobStatus::Failed
    );
    assert!(matches!(
        h.orchestrator.get_result(job_id).await,
        Err(Error::ResultNotFound { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn rejected_result_write_fails_job_without_result() {
    let h = Harness::new(ScriptedComputeClient::not_configured(), 60);
    h.store.reject_result_writes();
    let job_id = h
        .orchestrator
        .start_simulation(h.scenario("unsaved").await)
        .await
        .unwrap();

    assert_eq!(
        h.orchestrator.wait_for_job(job_id).await.unwrap(),
        JobStatus::Failed
    );
    assert_eq!(h.store.result_count().unwrap(), 0);
    assert!(matches!(
        h.orchestrator.get_result(job_id).await,
        Err(Error::ResultNotFound { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn empty_warehouse_produces_baseline() {
    let backend = Arc::new(InMemoryWarehouse::empty());
    let h = Harness::with_warehouse(
        ScriptedComputeClient::not_configured(),
        60,
        Warehouse::new(backend.clone()),
    );
    let scenario_id = h.scenario("no data").await;
    let job_id = h.orchestrator.start_simulation(scenario_id).await.unwrap();

    assert_eq!(
        h.orchestrator.wait_for_job(job_id).await.unwrap(),
        JobStatus::Completed
    );
    let result = h.orchestrator.get_result(job_id).await.unwrap();
    assert_eq!(result.source, ResultSource::Baseline);
    assert_eq!(result.metrics.total_orders, 1000);
    assert!(result.is_consistent());

    let saved = backend.saved_results().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, scenario_id);
}

#[tokio::test(start_paused = true)]
async fn failed_write_back_does_not_affect_status() {
    let backend = Arc::new(InMemoryWarehouse::empty().failing_save());
    let h = Harness::with_warehouse(
        ScriptedComputeClient::not_configured(),
        60,
        Warehouse::new(backend),
    );
    let job_id = h
        .orchestrator
        .start_simulation(h.scenario("write-back").await)
        .await
        .unwrap();

    assert_eq!(
        h.orchestrator.wait_for_job(job_id).await.unwrap(),
        JobStatus::Completed
    );
    assert!(h.orchestrator.get_result(job_id).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn compare_results_skips_scenarios_without_results() {
    let offline = Harness::new(ScriptedComputeClient::not_configured(), 60);
    let completed = offline.scenario("completed").await;
    let failed = offline.scenario("failed").await;
    let never_run = offline.scenario("never run").await;

    // A second orchestrator over the same store whose remote runs are skipped.
    let skipping = JobOrchestrator::new(
        Collaborators::with_store(
            Arc::clone(&offline.store),
            Arc::new(ScriptedComputeClient::new([RemoteRunState::Skipped])),
            ResultEstimator::new(Warehouse::synthetic_only()),
        ),
        PollConfig::new(INTERVAL, 60).unwrap(),
    );

    let ok_job = offline.orchestrator.start_simulation(completed).await.unwrap();
    let bad_job = skipping.start_simulation(failed).await.unwrap();
    assert_eq!(
        offline.orchestrator.wait_for_job(ok_job).await.unwrap(),
        JobStatus::Completed
    );
    assert_eq!(skipping.wait_for_job(bad_job).await.unwrap(), JobStatus::Failed);

    let results = offline
        .orchestrator
        .compare_results(&[failed, completed, never_run, ScenarioId::generate()])
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].scenario_id, completed);
    assert_eq!(results[0].job_id, Some(ok_job));
}

#[tokio::test(start_paused = true)]
async fn compare_results_returns_latest_per_scenario() {
    let h = Harness::new(ScriptedComputeClient::not_configured(), 60);
    let scenario_id = h.scenario("rerun").await;

    let first = h.orchestrator.start_simulation(scenario_id).await.unwrap();
    h.orchestrator.wait_for_job(first).await.unwrap();
    let second = h.orchestrator.start_simulation(scenario_id).await.unwrap();
    h.orchestrator.wait_for_job(second).await.unwrap();

    let results = h.orchestrator.compare_results(&[scenario_id]).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].job_id, Some(second));
}

/// Job store whose COMPLETED writes land only after `delay`.
struct SlowCompletionStore {
    inner: Arc<InMemoryStore>,
    delay: Duration,
}

#[async_trait]
impl JobStore for SlowCompletionStore {
    async fn insert_job(&self, job: &SimulationJob) -> Result<()> {
        self.inner.insert_job(job).await
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Option<SimulationJob>> {
        self.inner.get_job(job_id).await
    }

    async fn cas_job(&self, job: &SimulationJob, expected: JobStatus) -> Result<CasResult> {
        if job.status == JobStatus::Completed {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.cas_job(job, expected).await
    }
}

#[tokio::test(start_paused = true)]
async fn saved_result_stays_hidden_until_job_completes() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = JobOrchestrator::new(
        Collaborators {
            scenarios: store.clone(),
            jobs: Arc::new(SlowCompletionStore {
                inner: Arc::clone(&store),
                delay: Duration::from_secs(10),
            }),
            results: store.clone(),
            compute: Arc::new(ScriptedComputeClient::not_configured()),
            estimator: ResultEstimator::new(Warehouse::synthetic_only()).with_seed(11),
        },
        PollConfig::new(INTERVAL, 60).unwrap(),
    );
    let scenario = Scenario::new("slow commit");
    store.save_scenario(&scenario).await.unwrap();

    let first = orchestrator.start_simulation(scenario.id).await.unwrap();
    assert_eq!(orchestrator.wait_for_job(first).await.unwrap(), JobStatus::Completed);

    // The rerun's result is saved but its COMPLETED write is still pending.
    let second = orchestrator.start_simulation(scenario.id).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(orchestrator.get_job_status(second).await.unwrap(), JobStatus::Running);
    assert_eq!(store.result_count().unwrap(), 2);
    assert!(matches!(
        orchestrator.get_result(second).await,
        Err(Error::ResultNotFound { .. })
    ));
    let visible = orchestrator.compare_results(&[scenario.id]).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].job_id, Some(first));

    assert_eq!(orchestrator.wait_for_job(second).await.unwrap(), JobStatus::Completed);
    let visible = orchestrator.compare_results(&[scenario.id]).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].job_id, Some(second));
}

#[tokio::test(start_paused = true)]
async fn concurrent_jobs_run_independently() {
    let h = Harness::new(
        ScriptedComputeClient::new([RemoteRunState::Running, RemoteRunState::Terminated]),
        60,
    );

    let mut jobs = Vec::new();
    for i in 0..5 {
        let scenario_id = h.scenario(&format!("scenario {i}")).await;
        jobs.push(h.orchestrator.start_simulation(scenario_id).await.unwrap());
    }

    for job_id in &jobs {
        assert_eq!(
            h.orchestrator.wait_for_job(*job_id).await.unwrap(),
            JobStatus::Completed
        );
    }
    assert_eq!(h.compute.submissions().unwrap().len(), 5);
    assert_eq!(h.store.result_count().unwrap(), 5);
    assert_eq!(h.orchestrator.active_jobs().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_ids_are_reported() {
    let h = Harness::new(ScriptedComputeClient::not_configured(), 60);

    assert!(matches!(
        h.orchestrator.start_simulation(ScenarioId::generate()).await,
        Err(Error::ScenarioNotFound { .. })
    ));
    let missing = chainsim_core::JobId::generate();
    assert!(matches!(
        h.orchestrator.get_job_status(missing).await,
        Err(Error::JobNotFound { .. })
    ));
    assert!(matches!(
        h.orchestrator.wait_for_job(missing).await,
        Err(Error::JobNotFound { .. })
    ));
    assert!(matches!(
        h.orchestrator.cancel_job(missing).await,
        Err(Error::JobNotFound { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn invalid_scenario_is_rejected_before_job_creation() {
    let h = Harness::new(ScriptedComputeClient::not_configured(), 60);
    let scenario = Scenario::new("  ");
    h.store.save_scenario(&scenario).await.unwrap();

    assert!(matches!(
        h.orchestrator.start_simulation(scenario.id).await,
        Err(Error::InvalidInput { .. })
    ));
    assert_eq!(h.store.job_count().unwrap(), 0);
}
