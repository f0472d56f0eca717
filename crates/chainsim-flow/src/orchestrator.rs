//! Simulation job orchestration.
//!
//! [`JobOrchestrator`] owns the job state machine. Starting a simulation
//! creates a PENDING job record synchronously and spawns one task that drives
//! it to a terminal state:
//!
//! 1. Load the job and move it PENDING → RUNNING
//! 2. Submit the scenario to the compute service; on NotConfigured or
//!    Unavailable record a local placeholder handle and skip polling
//! 3. Poll the remote run within the configured budget
//! 4. Derive a result through the [`ResultEstimator`] fallback chain
//! 5. Persist the result, then move RUNNING → COMPLETED
//!
//! Any fault escaping those steps (including a panic) is caught at the task
//! boundary and recorded as FAILED with the fault's message. The task never
//! retries a failed job.
//!
//! ## Concurrency
//!
//! Every job runs in its own tokio task. Job records are only written by
//! their own task (plus the creating call), and every write is a CAS on the
//! expected status, so concurrent readers always see a whole record.
//! Cancellation is delivered through a per-job [`CancellationToken`] that
//! is a child of the orchestrator's shutdown token.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use chainsim_core::{JobId, ScenarioId, simulation_span};

use crate::compute::{ComputeClient, ComputeError, RunHandle};
use crate::error::{Error, Result};
use crate::estimate::ResultEstimator;
use crate::job::{JobStatus, SimulationJob, progress};
use crate::metrics::JobMetrics;
use crate::poll::{PollConfig, poll_until_terminal};
use crate::result::SimulationResult;
use crate::scenario::Scenario;
use crate::store::{CasResult, JobStore, ResultStore, ScenarioStore};

/// External collaborators the orchestrator is built from.
#[derive(Clone)]
pub struct Collaborators {
    /// Scenario lookup.
    pub scenarios: Arc<dyn ScenarioStore>,
    /// Job records.
    pub jobs: Arc<dyn JobStore>,
    /// Authoritative results.
    pub results: Arc<dyn ResultStore>,
    /// Remote compute service.
    pub compute: Arc<dyn ComputeClient>,
    /// Result derivation chain.
    pub estimator: ResultEstimator,
}

impl Collaborators {
    /// Uses one store for scenarios, jobs and results.
    #[must_use]
    pub fn with_store<S>(store: Arc<S>, compute: Arc<dyn ComputeClient>, estimator: ResultEstimator) -> Self
    where
        S: ScenarioStore + JobStore + ResultStore + 'static,
    {
        Self {
            scenarios: store.clone(),
            jobs: store.clone(),
            results: store,
            compute,
            estimator,
        }
    }
}

struct JobTask {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    scenarios: Arc<dyn ScenarioStore>,
    jobs: Arc<dyn JobStore>,
    results: Arc<dyn ResultStore>,
    compute: Arc<dyn ComputeClient>,
    estimator: ResultEstimator,
    poll: PollConfig,
    metrics: JobMetrics,
    tasks: Mutex<HashMap<JobId, JobTask>>,
    shutdown: CancellationToken,
}

fn recency(result: &SimulationResult) -> (Option<DateTime<Utc>>, Option<JobId>) {
    (result.completed_at, result.job_id)
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("job task registry lock poisoned")
}

/// Drives simulation jobs from PENDING to a terminal state.
///
/// Cheap to clone; clones share jobs, tasks and the shutdown signal.
#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("poll", &self.inner.poll)
            .field("estimator", &self.inner.estimator)
            .field("shutdown", &self.inner.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl JobOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(collaborators: Collaborators, poll: PollConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                scenarios: collaborators.scenarios,
                jobs: collaborators.jobs,
                results: collaborators.results,
                compute: collaborators.compute,
                estimator: collaborators.estimator,
                poll,
                metrics: JobMetrics::new(),
                tasks: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Returns the poll configuration.
    #[must_use]
    pub fn poll_config(&self) -> PollConfig {
        self.inner.poll
    }

    /// Starts a simulation for a scenario.
    ///
    /// Returns as soon as the PENDING job record exists; execution continues
    /// in the background.
    ///
    /// # Errors
    ///
    /// - [`Error::ScenarioNotFound`] if the scenario does not exist
    /// - [`Error::InvalidInput`] if the scenario fails validation
    /// - a storage error if the job record cannot be created
    #[tracing::instrument(skip(self))]
    pub async fn start_simulation(&self, scenario_id: ScenarioId) -> Result<JobId> {
        let scenario = self
            .inner
            .scenarios
            .get_scenario(&scenario_id)
            .await?
            .ok_or(Error::ScenarioNotFound { scenario_id })?;
        scenario.validate()?;

        let job = SimulationJob::new(scenario_id);
        self.inner.jobs.insert_job(&job).await?;
        self.spawn_job(job.id, scenario)?;

        tracing::info!(job_id = %job.id, "simulation job created");
        Ok(job.id)
    }

    /// Returns a job's current status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`] if the job does not exist.
    pub async fn get_job_status(&self, job_id: JobId) -> Result<JobStatus> {
        Ok(self.get_job(job_id).await?.status)
    }

    /// Returns the full job record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`] if the job does not exist.
    pub async fn get_job(&self, job_id: JobId) -> Result<SimulationJob> {
        self.inner
            .jobs
            .get_job(&job_id)
            .await?
            .ok_or(Error::JobNotFound { job_id })
    }

    /// Returns the result of a COMPLETED job.
    ///
    /// # Errors
    ///
    /// - [`Error::JobNotFound`] if the job does not exist
    /// - [`Error::ResultNotFound`] if the job is not COMPLETED
    pub async fn get_result(&self, job_id: JobId) -> Result<SimulationResult> {
        let job = self.get_job(job_id).await?;
        if job.status != JobStatus::Completed {
            return Err(Error::ResultNotFound { job_id });
        }
        self.inner
            .results
            .get_result(&job_id)
            .await?
            .ok_or(Error::ResultNotFound { job_id })
    }

    /// Returns the latest result of a COMPLETED job for each requested
    /// scenario, in request order.
    ///
    /// Scenarios without such a result are skipped silently. Results whose
    /// job has not been marked COMPLETED are never returned.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the result or job store cannot be read.
    pub async fn compare_results(&self, scenario_ids: &[ScenarioId]) -> Result<Vec<SimulationResult>> {
        let mut latest: HashMap<ScenarioId, SimulationResult> = HashMap::new();
        for result in self.inner.results.scenario_results(scenario_ids).await? {
            if !self.owner_completed(&result).await? {
                continue;
            }
            let newer = latest
                .get(&result.scenario_id)
                .is_none_or(|current| recency(&result) > recency(current));
            if newer {
                latest.insert(result.scenario_id, result);
            }
        }

        // Removing as we go drops repeated ids.
        Ok(scenario_ids
            .iter()
            .filter_map(|id| latest.remove(id))
            .collect())
    }

    async fn owner_completed(&self, result: &SimulationResult) -> Result<bool> {
        let Some(job_id) = result.job_id else {
            return Ok(false);
        };
        let job = self.inner.jobs.get_job(&job_id).await?;
        Ok(job.is_some_and(|job| job.status == JobStatus::Completed))
    }

    /// Requests cancellation of an in-flight job.
    ///
    /// The job ends FAILED("cancelled") at its next poll interval boundary.
    /// Repeated calls while the job is in flight are no-ops.
    ///
    /// # Errors
    ///
    /// - [`Error::JobNotFound`] if the job does not exist
    /// - [`Error::InvalidStateTransition`] if the job is already terminal
    #[tracing::instrument(skip(self))]
    pub async fn cancel_job(&self, job_id: JobId) -> Result<()> {
        let job = self.get_job(job_id).await?;
        if job.is_terminal() {
            return Err(Error::InvalidStateTransition {
                from: job.status.to_string(),
                to: JobStatus::Failed.to_string(),
                reason: "job already finished".into(),
            });
        }

        let token = {
            let tasks = self.inner.tasks.lock().map_err(poison_err)?;
            tasks.get(&job_id).map(|task| task.cancel.clone())
        };
        match token {
            Some(token) => {
                token.cancel();
                tracing::info!("cancellation requested");
            }
            // Task finished between the read and the lookup.
            None => tracing::debug!("job task already finished"),
        }
        Ok(())
    }

    /// Waits for a job's task to finish and returns the job's status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`] if the job does not exist.
    pub async fn wait_for_job(&self, job_id: JobId) -> Result<JobStatus> {
        let done = {
            let tasks = self.inner.tasks.lock().map_err(poison_err)?;
            tasks.get(&job_id).map(|task| task.done.clone())
        };
        if let Some(mut done) = done {
            // A closed channel also means the task is gone.
            let _ = done.wait_for(|finished| *finished).await;
        }
        self.get_job_status(job_id).await
    }

    /// Number of jobs with a live task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task registry lock is poisoned.
    pub fn active_jobs(&self) -> Result<usize> {
        let tasks = self.inner.tasks.lock().map_err(poison_err)?;
        Ok(tasks.len())
    }

    /// Cancels every in-flight job and waits for their tasks to finish.
    ///
    /// Jobs started afterwards are cancelled immediately.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let handles: Vec<JoinHandle<()>> = match self.inner.tasks.lock() {
            Ok(mut tasks) => tasks.values_mut().filter_map(|t| t.handle.take()).collect(),
            Err(e) => {
                tracing::error!(error = %e, "job task registry poisoned during shutdown");
                Vec::new()
            }
        };

        tracing::info!(jobs = handles.len(), "shutting down simulation jobs");
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "simulation job task ended abnormally");
            }
        }
    }

    fn spawn_job(&self, job_id: JobId, scenario: Scenario) -> Result<()> {
        let cancel = self.inner.shutdown.child_token();
        let (done_tx, done_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();

        // Hold the registry lock across the spawn so the task cannot
        // deregister itself before it has been registered.
        let mut tasks = self.inner.tasks.lock().map_err(poison_err)?;
        let handle = tokio::spawn(async move {
            inner.run_job(job_id, scenario, task_cancel).await;
            match inner.tasks.lock() {
                Ok(mut tasks) => {
                    tasks.remove(&job_id);
                }
                Err(e) => tracing::error!(error = %e, "job task registry poisoned"),
            }
            done_tx.send_replace(true);
        });
        tasks.insert(
            job_id,
            JobTask {
                cancel,
                done: done_rx,
                handle: Some(handle),
            },
        );
        drop(tasks);
        Ok(())
    }
}

impl Inner {
    async fn run_job(&self, job_id: JobId, scenario: Scenario, cancel: CancellationToken) {
        let span = simulation_span("run", &job_id.to_string(), &scenario.id.to_string());
        async {
            self.metrics.job_task_started();
            let outcome = AssertUnwindSafe(self.execute(job_id, &scenario, &cancel))
                .catch_unwind()
                .await;
            let status = match outcome {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => self.fail_job(job_id, &e.to_string()).await,
                Err(_) => {
                    self.fail_job(job_id, "internal error: simulation task panicked")
                        .await
                }
            };
            self.metrics.job_task_finished();
            tracing::info!(%status, "simulation job finished");
        }
        .instrument(span)
        .await;
    }

    async fn execute(
        &self,
        job_id: JobId,
        scenario: &Scenario,
        cancel: &CancellationToken,
    ) -> Result<JobStatus> {
        let mut job = self
            .jobs
            .get_job(&job_id)
            .await?
            .ok_or(Error::JobNotFound { job_id })?;

        job.transition_to(JobStatus::Running)?;
        self.persist(&job, JobStatus::Pending).await?;
        self.metrics.record_transition(
            JobStatus::Pending.as_label(),
            JobStatus::Running.as_label(),
        );

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (handle, remote) = match self.compute.submit(&scenario.id).await {
            Ok(handle) => (handle, true),
            Err(ComputeError::NotConfigured) => {
                tracing::info!("compute service not configured; estimating locally");
                (RunHandle::placeholder(&scenario.id), false)
            }
            Err(ComputeError::Unavailable { message }) => {
                tracing::warn!(error = %message, "compute service unavailable; estimating locally");
                (RunHandle::placeholder(&scenario.id), false)
            }
        };
        job.external_run_id = Some(handle.to_string());
        job.advance_progress(progress::SUBMITTED);
        self.persist(&job, JobStatus::Running).await?;

        if remote {
            let metrics = self.metrics;
            let outcome = poll_until_terminal(
                self.compute.as_ref(),
                &handle,
                &self.poll,
                cancel,
                |_, state| metrics.record_poll_attempt(state.as_label()),
            )
            .await;

            if let Some(message) = outcome.failure_message(&self.poll) {
                tracing::warn!(?outcome, "remote simulation run did not finish");
                return Ok(self.fail_job(job_id, &message).await);
            }
        } else if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        job.advance_progress(progress::ESTIMATING);
        self.persist(&job, JobStatus::Running).await?;

        let remote_handle = remote.then_some(&handle);
        let mut result = self.estimator.estimate(scenario, remote_handle).await;
        self.metrics.record_estimation_tier(result.source.as_label());

        self.complete_job(&mut job, &mut result).await?;

        self.estimator.write_back(&scenario.id, &result).await;
        Ok(JobStatus::Completed)
    }

    /// Persists the result, then marks the job COMPLETED.
    ///
    /// If the job cannot be marked COMPLETED the result is removed again, so a
    /// result never outlives a job that did not complete.
    async fn complete_job(&self, job: &mut SimulationJob, result: &mut SimulationResult) -> Result<()> {
        job.transition_to(JobStatus::Completed)?;
        result.job_id = Some(job.id);
        result.completed_at = job.completed_at;

        self.results.save_result(&job.id, result).await?;

        if let Err(e) = self.persist(job, JobStatus::Running).await {
            if let Err(cleanup) = self.results.delete_result(&job.id).await {
                tracing::error!(error = %cleanup, "failed to remove result of uncompleted job");
            }
            return Err(e);
        }

        self.metrics.record_transition(
            JobStatus::Running.as_label(),
            JobStatus::Completed.as_label(),
        );
        self.record_terminal(job);
        tracing::info!(
            tier = result.source.as_label(),
            total_cost = result.total_cost,
            service_level = result.service_level,
            "simulation job completed"
        );
        Ok(())
    }

    /// Marks a job FAILED; never returns an error.
    async fn fail_job(&self, job_id: JobId, message: &str) -> JobStatus {
        match self.try_fail_job(job_id, message).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(error = %e, reason = message, "failed to record job failure");
                JobStatus::Failed
            }
        }
    }

    async fn try_fail_job(&self, job_id: JobId, message: &str) -> Result<JobStatus> {
        let mut job = self
            .jobs
            .get_job(&job_id)
            .await?
            .ok_or(Error::JobNotFound { job_id })?;
        if job.is_terminal() {
            return Ok(job.status);
        }

        let expected = job.status;
        if job.status == JobStatus::Pending {
            job.transition_to(JobStatus::Running)?;
            self.metrics.record_transition(
                JobStatus::Pending.as_label(),
                JobStatus::Running.as_label(),
            );
        }
        job.fail(message)?;
        self.persist(&job, expected).await?;

        self.metrics.record_transition(
            JobStatus::Running.as_label(),
            JobStatus::Failed.as_label(),
        );
        self.record_terminal(&job);
        tracing::warn!(reason = message, "simulation job failed");
        Ok(JobStatus::Failed)
    }

    async fn persist(&self, job: &SimulationJob, expected: JobStatus) -> Result<()> {
        match self.jobs.cas_job(job, expected).await? {
            CasResult::Success => Ok(()),
            CasResult::NotFound => Err(Error::JobNotFound { job_id: job.id }),
            CasResult::StateMismatch { actual } => Err(Error::InvalidStateTransition {
                from: actual.to_string(),
                to: job.status.to_string(),
                reason: format!("expected stored status {expected}"),
            }),
        }
    }

    fn record_terminal(&self, job: &SimulationJob) {
        let started = job.started_at.unwrap_or(job.created_at);
        let finished = job.completed_at.unwrap_or_else(Utc::now);
        let duration = (finished - started)
            .to_std()
            .map_or(0.0, |d| d.as_secs_f64());
        self.metrics.record_terminal(job.status.as_label(), duration);
    }
}
