//! Scripted compute client for testing.
//!
//! [`ScriptedComputeClient`] answers submissions with a configured outcome and
//! replays a scripted sequence of run states. Once the script is exhausted
//! the final state repeats, so a script of `[Running, Terminated]` reports
//! TERMINATED forever after the second poll.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: Nothing is executed
//! - **One script per client**: Every submitted run replays the same states

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use chainsim_core::ScenarioId;

use super::{ComputeClient, ComputeError, RemoteRunState, RunHandle};
use crate::error::{Error, Result};

/// How the scripted client answers submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitBehavior {
    /// Accept and hand out sequential run IDs.
    Accept,
    /// Behave as if endpoint and credentials were absent.
    NotConfigured,
    /// Fail with an unavailable error.
    Unavailable(String),
}

#[derive(Debug)]
struct ScriptState {
    states: VecDeque<RemoteRunState>,
    last: RemoteRunState,
    submissions: Vec<ScenarioId>,
    polls: Vec<RunHandle>,
    next_run_id: u64,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("scripted compute lock poisoned")
}

/// Compute client driven by a pre-recorded script.
#[derive(Debug)]
pub struct ScriptedComputeClient {
    behavior: SubmitBehavior,
    state: RwLock<ScriptState>,
}

impl ScriptedComputeClient {
    /// Creates a client that accepts submissions and replays `states`.
    ///
    /// An empty script reports UNKNOWN on every poll.
    #[must_use]
    pub fn new(states: impl IntoIterator<Item = RemoteRunState>) -> Self {
        Self {
            behavior: SubmitBehavior::Accept,
            state: RwLock::new(ScriptState {
                states: states.into_iter().collect(),
                last: RemoteRunState::Unknown,
                submissions: Vec::new(),
                polls: Vec::new(),
                next_run_id: 1,
            }),
        }
    }

    /// Creates a client that behaves as if unconfigured.
    #[must_use]
    pub fn not_configured() -> Self {
        Self::new([]).with_submit_behavior(SubmitBehavior::NotConfigured)
    }

    /// Creates a client whose submissions fail as unavailable.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new([]).with_submit_behavior(SubmitBehavior::Unavailable(message.into()))
    }

    /// Overrides how submissions are answered.
    #[must_use]
    pub fn with_submit_behavior(mut self, behavior: SubmitBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Scenarios submitted so far, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn submissions(&self) -> Result<Vec<ScenarioId>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.submissions.clone())
    }

    /// Number of state queries answered so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn poll_count(&self) -> Result<usize> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.polls.len())
    }
}

#[async_trait]
impl ComputeClient for ScriptedComputeClient {
    async fn submit(&self, scenario_id: &ScenarioId) -> std::result::Result<RunHandle, ComputeError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ComputeError::unavailable("scripted compute lock poisoned"))?;
        state.submissions.push(*scenario_id);

        match &self.behavior {
            SubmitBehavior::Accept => {
                let run_id = state.next_run_id;
                state.next_run_id += 1;
                drop(state);
                Ok(RunHandle::new(run_id.to_string()))
            }
            SubmitBehavior::NotConfigured => Err(ComputeError::NotConfigured),
            SubmitBehavior::Unavailable(message) => Err(ComputeError::unavailable(message.clone())),
        }
    }

    async fn get_run_state(&self, handle: &RunHandle) -> RemoteRunState {
        let Ok(mut state) = self.state.write() else {
            return RemoteRunState::Unknown;
        };
        state.polls.push(handle.clone());
        if let Some(next) = state.states.pop_front() {
            state.last = next;
        }
        state.last
    }
}
