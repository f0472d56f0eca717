//! Bounded, cancellation-aware polling of a remote run.
//!
//! The protocol: query the run state, classify it, and if it is not final
//! wait one interval and try again, up to `max_attempts` queries.
//!
//! | State | Outcome |
//! |-------|---------|
//! | TERMINATED | [`PollOutcome::Terminated`] |
//! | SKIPPED, INTERNAL_ERROR | [`PollOutcome::RemoteFailed`] |
//! | PENDING, RUNNING, UNKNOWN | keep polling; [`PollOutcome::TimedOut`] once the budget is spent |
//!
//! The wait between attempts is a tokio timer raced against a
//! [`CancellationToken`], so a cancelled job stops at the next interval
//! boundary instead of waiting out the budget.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::compute::{ComputeClient, RemoteRunState, RunHandle};
use crate::error::{Error, Result};

/// Poll interval and attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait between state queries.
    pub interval: Duration,
    /// Maximum number of state queries.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollConfig {
    /// Default wait between queries.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
    /// Default attempt budget.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

    /// Creates a poll configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval is zero or the budget is zero.
    pub fn new(interval: Duration, max_attempts: u32) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::configuration("poll interval must be greater than zero"));
        }
        if max_attempts == 0 {
            return Err(Error::configuration(
                "poll max_attempts must be greater than zero",
            ));
        }
        Ok(Self {
            interval,
            max_attempts,
        })
    }

    /// Upper bound on time spent polling (`interval * max_attempts`).
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// How a poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The run finished.
    Terminated {
        /// Queries made.
        attempts: u32,
    },
    /// The service failed or skipped the run.
    RemoteFailed {
        /// The failing state.
        state: RemoteRunState,
        /// Queries made.
        attempts: u32,
    },
    /// The budget ran out before a final state was seen.
    TimedOut {
        /// Queries made.
        attempts: u32,
        /// Last state observed.
        last_state: RemoteRunState,
    },
    /// The cancellation token fired.
    Cancelled {
        /// Queries made before cancellation.
        attempts: u32,
    },
}

impl PollOutcome {
    /// Human-readable failure message, `None` for [`PollOutcome::Terminated`].
    #[must_use]
    pub fn failure_message(&self, config: &PollConfig) -> Option<String> {
        match self {
            Self::Terminated { .. } => None,
            Self::RemoteFailed { state, .. } => {
                Some(format!("remote simulation run ended in state {state}"))
            }
            Self::TimedOut {
                attempts,
                last_state,
            } => Some(format!(
                "timed out waiting for remote simulation run after {attempts} attempts over {}s (last state {last_state})",
                config.timeout().as_secs()
            )),
            Self::Cancelled { .. } => Some(Error::Cancelled.to_string()),
        }
    }
}

/// Polls `handle` until it reaches a final state, the budget is spent, or
/// `cancel` fires.
///
/// `on_attempt` is called after every query with the 1-based attempt number
/// and the observed state.
pub async fn poll_until_terminal<F>(
    client: &dyn ComputeClient,
    handle: &RunHandle,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut on_attempt: F,
) -> PollOutcome
where
    F: FnMut(u32, RemoteRunState) + Send,
{
    let mut last_state = RemoteRunState::Unknown;

    for attempt in 1..=config.max_attempts {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled {
                attempts: attempt - 1,
            };
        }

        let state = client.get_run_state(handle).await;
        on_attempt(attempt, state);
        tracing::debug!(attempt, %state, run_id = %handle, "polled remote run");

        match state {
            RemoteRunState::Terminated => return PollOutcome::Terminated { attempts: attempt },
            RemoteRunState::Skipped | RemoteRunState::InternalError => {
                return PollOutcome::RemoteFailed {
                    state,
                    attempts: attempt,
                };
            }
            RemoteRunState::Pending | RemoteRunState::Running | RemoteRunState::Unknown => {
                last_state = state;
            }
        }

        if attempt == config.max_attempts {
            break;
        }

        tokio::select! {
            () = cancel.cancelled() => {
                return PollOutcome::Cancelled { attempts: attempt };
            }
            () = tokio::time::sleep(config.interval) => {}
        }
    }

    PollOutcome::TimedOut {
        attempts: config.max_attempts,
        last_state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::memory::ScriptedComputeClient;

    fn config(max_attempts: u32) -> PollConfig {
        PollConfig::new(Duration::from_secs(5), max_attempts).unwrap()
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(PollConfig::new(Duration::ZERO, 3).is_err());
        assert!(PollConfig::new(Duration::from_secs(1), 0).is_err());
        assert_eq!(PollConfig::default().timeout(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn terminated_after_running() {
        let client = ScriptedComputeClient::new([
            RemoteRunState::Pending,
            RemoteRunState::Running,
            RemoteRunState::Terminated,
        ]);
        let mut seen = Vec::new();
        let outcome = poll_until_terminal(
            &client,
            &RunHandle::new("1"),
            &config(10),
            &CancellationToken::new(),
            |_, state| seen.push(state),
        )
        .await;

        assert_eq!(outcome, PollOutcome::Terminated { attempts: 3 });
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_is_retried_until_budget() {
        let client = ScriptedComputeClient::new([RemoteRunState::Unknown]);
        let started = tokio::time::Instant::now();
        let outcome = poll_until_terminal(
            &client,
            &RunHandle::new("1"),
            &config(4),
            &CancellationToken::new(),
            |_, _| {},
        )
        .await;

        assert_eq!(
            outcome,
            PollOutcome::TimedOut {
                attempts: 4,
                last_state: RemoteRunState::Unknown
            }
        );
        assert_eq!(client.poll_count().unwrap(), 4);
        // Three waits between four queries; none after the last one.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(20));
        let message = outcome.failure_message(&config(4)).unwrap();
        assert!(message.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_stops_immediately() {
        let client =
            ScriptedComputeClient::new([RemoteRunState::Running, RemoteRunState::InternalError]);
        let outcome = poll_until_terminal(
            &client,
            &RunHandle::new("1"),
            &config(10),
            &CancellationToken::new(),
            |_, _| {},
        )
        .await;

        assert_eq!(
            outcome,
            PollOutcome::RemoteFailed {
                state: RemoteRunState::InternalError,
                attempts: 2
            }
        );
        assert!(
            outcome
                .failure_message(&config(10))
                .unwrap()
                .contains("INTERNAL_ERROR")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_observed_at_interval_boundary() {
        let client = ScriptedComputeClient::new([RemoteRunState::Running]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            trigger.cancel();
        });

        let outcome = poll_until_terminal(
            &client,
            &RunHandle::new("1"),
            &config(60),
            &cancel,
            |_, _| {},
        )
        .await;

        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 2 });
        assert_eq!(
            outcome.failure_message(&config(60)).as_deref(),
            Some("cancelled")
        );
    }

    #[tokio::test]
    async fn pre_cancelled_token_skips_polling() {
        let client = ScriptedComputeClient::new([RemoteRunState::Running]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome =
            poll_until_terminal(&client, &RunHandle::new("1"), &config(3), &cancel, |_, _| {})
                .await;
        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 0 });
        assert_eq!(client.poll_count().unwrap(), 0);
    }
}
