//! Jobs REST API compute client.
//!
//! [`JobsApiClient`] submits one-off simulation runs and reads their
//! life-cycle state:
//!
//! - `POST {base_url}/api/2.1/jobs/runs/submit` with a [`RunSubmission`] body,
//!   answered by `{ "run_id": <n> }`
//! - `GET {base_url}/api/2.1/jobs/runs/get?run_id=<n>`, answered by
//!   `{ "state": { "life_cycle_state": "..." } }`
//!
//! A client built without a [`ComputeConfig`] reports
//! [`ComputeError::NotConfigured`] on submit and never touches the network.
//!
//! ## Example
//!
//! ```rust,ignore
//! use chainsim_flow::compute::jobs_api::{ComputeConfig, JobsApiClient};
//!
//! let config = ComputeConfig::new("https://workspace.example.com", token)
//!     .with_cluster_id("0101-abc");
//! let client = JobsApiClient::new(Some(config))?;
//! let handle = client.submit(&scenario_id).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use chainsim_core::ScenarioId;

use super::{
    ComputeClient, ComputeError, ComputeTarget, DEFAULT_SIMULATION_SCRIPT, EphemeralCluster,
    RemoteRunState, RunHandle, RunSubmission,
};
use crate::error::{Error, Result};

const SUBMIT_PATH: &str = "/api/2.1/jobs/runs/submit";
const GET_PATH: &str = "/api/2.1/jobs/runs/get";

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Connection settings for the compute service.
#[derive(Clone)]
pub struct ComputeConfig {
    /// Workspace base URL.
    pub base_url: String,
    /// Bearer token.
    pub token: String,
    /// Existing resource to run on; an ephemeral one is provisioned when unset.
    pub cluster_id: Option<String>,
    /// Remote script entry point.
    pub script: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

// Manual Debug so the token never reaches logs.
impl std::fmt::Debug for ComputeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("cluster_id", &self.cluster_id)
            .field("script", &self.script)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ComputeConfig {
    /// Creates a new config with required fields.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            cluster_id: None,
            script: DEFAULT_SIMULATION_SCRIPT.to_string(),
            request_timeout: default_request_timeout(),
        }
    }

    /// Runs on an existing resource instead of provisioning one.
    #[must_use]
    pub fn with_cluster_id(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = Some(cluster_id.into());
        self
    }

    /// Sets the remote script entry point.
    #[must_use]
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    /// Sets the per-request HTTP timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns where runs execute.
    #[must_use]
    pub fn target(&self) -> ComputeTarget {
        self.cluster_id.as_ref().map_or_else(
            || ComputeTarget::Ephemeral(EphemeralCluster::default()),
            |cluster_id| ComputeTarget::Existing {
                cluster_id: cluster_id.clone(),
            },
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    run_id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GetRunResponse {
    state: Option<RunStateBody>,
}

#[derive(Debug, Deserialize)]
struct RunStateBody {
    life_cycle_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error_code: Option<String>,
    message: String,
}

/// Compute client speaking the Jobs REST API.
#[derive(Debug)]
pub struct JobsApiClient {
    config: Option<ComputeConfig>,
    client: reqwest::Client,
}

impl JobsApiClient {
    /// Creates a client.
    ///
    /// `None` yields an unconfigured client that reports
    /// [`ComputeError::NotConfigured`] on every submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is present but invalid, or the
    /// HTTP client cannot be built.
    pub fn new(config: Option<ComputeConfig>) -> Result<Self> {
        if let Some(config) = &config {
            if config.base_url.trim().is_empty() {
                return Err(Error::configuration("compute base_url cannot be empty"));
            }
            if config.token.is_empty() {
                return Err(Error::configuration("compute token cannot be empty"));
            }
            if config.request_timeout.is_zero() {
                return Err(Error::configuration(
                    "compute request_timeout must be greater than zero",
                ));
            }
        }

        let timeout = config
            .as_ref()
            .map_or_else(default_request_timeout, |c| c.request_timeout);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Creates a client with no endpoint or credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn unconfigured() -> Result<Self> {
        Self::new(None)
    }

    /// Returns true if endpoint and credentials are present.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());

        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
            return match error.error_code {
                Some(code) => format!("{status}: {} ({code})", error.message),
                None => format!("{status}: {}", error.message),
            };
        }
        format!("{status} - {body}")
    }
}

fn run_id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl ComputeClient for JobsApiClient {
    #[tracing::instrument(skip(self), fields(scenario_id = %scenario_id))]
    async fn submit(&self, scenario_id: &ScenarioId) -> std::result::Result<RunHandle, ComputeError> {
        let Some(config) = &self.config else {
            return Err(ComputeError::NotConfigured);
        };

        let submission = RunSubmission::for_scenario(scenario_id, &config.script, config.target());

        let response = self
            .client
            .post(config.endpoint(SUBMIT_PATH))
            .bearer_auth(&config.token)
            .json(&submission)
            .send()
            .await
            .map_err(|e| ComputeError::unavailable(format!("run submission failed: {e}")))?;

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            return Err(ComputeError::unavailable(format!(
                "run submission rejected: {message}"
            )));
        }

        let body: SubmitResponse = response.json().await.map_err(|e| {
            ComputeError::unavailable(format!("failed to parse submission response: {e}"))
        })?;

        let run_id = run_id_string(&body.run_id).ok_or_else(|| {
            ComputeError::unavailable(format!("submission response had no usable run_id: {}", body.run_id))
        })?;

        tracing::info!(run_id = %run_id, "submitted simulation run");
        Ok(RunHandle::new(run_id))
    }

    #[tracing::instrument(skip(self), fields(run_id = %handle))]
    async fn get_run_state(&self, handle: &RunHandle) -> RemoteRunState {
        let Some(config) = &self.config else {
            return RemoteRunState::Unknown;
        };

        let response = match self
            .client
            .get(config.endpoint(GET_PATH))
            .query(&[("run_id", handle.as_str())])
            .bearer_auth(&config.token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "run state request failed");
                return RemoteRunState::Unknown;
            }
        };

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            tracing::warn!(error = %message, "run state request rejected");
            return RemoteRunState::Unknown;
        }

        match response.json::<GetRunResponse>().await {
            Ok(body) => body
                .state
                .and_then(|s| s.life_cycle_state)
                .map_or(RemoteRunState::Unknown, |s| RemoteRunState::from_life_cycle(&s)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse run state response");
                RemoteRunState::Unknown
            }
        }
    }
}
