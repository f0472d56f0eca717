//! In-memory store implementation for testing.
//!
//! This module provides [`InMemoryStore`], a simple in-memory implementation of
//! [`JobStore`], [`ResultStore`] and [`ScenarioStore`] suitable for testing and
//! development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process coordination
//! - **No persistence**: All state is lost when the process exits

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use chainsim_core::{JobId, ScenarioId};

use super::{CasResult, JobStore, ResultStore, ScenarioStore};
use crate::error::{Error, Result};
use crate::job::{JobStatus, SimulationJob};
use crate::result::SimulationResult;
use crate::scenario::Scenario;

/// In-memory store for testing.
///
/// ## Example
///
/// ```rust
/// use chainsim_flow::store::memory::InMemoryStore;
///
/// let store = InMemoryStore::new();
/// // Use store in tests...
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    jobs: RwLock<HashMap<JobId, SimulationJob>>,
    results: RwLock<HashMap<JobId, SimulationResult>>,
    scenarios: RwLock<HashMap<ScenarioId, Scenario>>,
    reject_result_writes: AtomicBool,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent result write fail.
    pub fn reject_result_writes(&self) {
        self.reject_result_writes.store(true, Ordering::SeqCst);
    }

    /// Returns the number of jobs currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn job_count(&self) -> Result<usize> {
        let count = {
            let jobs = self.jobs.read().map_err(poison_err)?;
            jobs.len()
        };
        Ok(count)
    }

    /// Returns the number of results currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn result_count(&self) -> Result<usize> {
        let count = {
            let results = self.results.read().map_err(poison_err)?;
            results.len()
        };
        Ok(count)
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn insert_job(&self, job: &SimulationJob) -> Result<()> {
        let mut jobs = self.jobs.write().map_err(poison_err)?;
        if jobs.contains_key(&job.id) {
            drop(jobs);
            return Err(Error::storage(format!("job already exists: {}", job.id)));
        }
        jobs.insert(job.id, job.clone());
        drop(jobs);
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Option<SimulationJob>> {
        let job = {
            let jobs = self.jobs.read().map_err(poison_err)?;
            jobs.get(job_id).cloned()
        };
        Ok(job)
    }

    async fn cas_job(&self, job: &SimulationJob, expected: JobStatus) -> Result<CasResult> {
        let mut jobs = self.jobs.write().map_err(poison_err)?;

        let Some(current) = jobs.get_mut(&job.id) else {
            drop(jobs);
            return Ok(CasResult::NotFound);
        };

        if current.status != expected {
            let actual = current.status;
            drop(jobs);
            return Ok(CasResult::StateMismatch { actual });
        }

        *current = job.clone();
        drop(jobs);
        Ok(CasResult::Success)
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn save_result(&self, job_id: &JobId, result: &SimulationResult) -> Result<()> {
        if self.reject_result_writes.load(Ordering::SeqCst) {
            return Err(Error::storage("result store rejected write"));
        }
        let mut results = self.results.write().map_err(poison_err)?;
        results.insert(*job_id, result.clone());
        drop(results);
        Ok(())
    }

    async fn get_result(&self, job_id: &JobId) -> Result<Option<SimulationResult>> {
        let result = {
            let results = self.results.read().map_err(poison_err)?;
            results.get(job_id).cloned()
        };
        Ok(result)
    }

    async fn delete_result(&self, job_id: &JobId) -> Result<()> {
        let mut results = self.results.write().map_err(poison_err)?;
        results.remove(job_id);
        drop(results);
        Ok(())
    }

    async fn scenario_results(&self, scenario_ids: &[ScenarioId]) -> Result<Vec<SimulationResult>> {
        let wanted: HashSet<&ScenarioId> = scenario_ids.iter().collect();
        let matching = {
            let results = self.results.read().map_err(poison_err)?;
            results
                .values()
                .filter(|r| wanted.contains(&r.scenario_id))
                .cloned()
                .collect()
        };
        Ok(matching)
    }
}

#[async_trait]
impl ScenarioStore for InMemoryStore {
    async fn get_scenario(&self, scenario_id: &ScenarioId) -> Result<Option<Scenario>> {
        let scenario = {
            let scenarios = self.scenarios.read().map_err(poison_err)?;
            scenarios.get(scenario_id).cloned()
        };
        Ok(scenario)
    }

    async fn save_scenario(&self, scenario: &Scenario) -> Result<()> {
        {
            let mut scenarios = self.scenarios.write().map_err(poison_err)?;
            scenarios.insert(scenario.id, scenario.clone());
        }
        Ok(())
    }
}
