//! Runtime configuration.
//!
//! Read from the environment by [`SimulationConfig::from_env`]:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `CHAINSIM_COMPUTE_URL` | unset | Compute service base URL |
//! | `CHAINSIM_COMPUTE_TOKEN` | unset | Compute service bearer token |
//! | `CHAINSIM_COMPUTE_CLUSTER_ID` | unset | Existing compute resource (ephemeral when unset) |
//! | `CHAINSIM_COMPUTE_SCRIPT` | `dbfs:/simulations/monte_carlo_simulation.py` | Remote entry point |
//! | `CHAINSIM_POLL_INTERVAL_SECS` | `5` | Wait between state queries |
//! | `CHAINSIM_POLL_MAX_ATTEMPTS` | `60` | State query budget |
//! | `CHAINSIM_WAREHOUSE_URL` | unset | Warehouse SQL API base URL |
//! | `CHAINSIM_WAREHOUSE_TOKEN` | unset | Warehouse bearer token |
//! | `CHAINSIM_WAREHOUSE_NAME` | `COMPUTE_WH` | Compute warehouse |
//! | `CHAINSIM_WAREHOUSE_DATABASE` | `SUPPLYCHAIN` | Database |
//! | `CHAINSIM_WAREHOUSE_SCHEMA` | `RAW` | Schema |
//! | `CHAINSIM_ESTIMATOR_SEED` | unset | Fixed seed for estimation randomness |
//! | `CHAINSIM_LOG_FORMAT` | `pretty` | `json` or `pretty` |
//!
//! Missing compute URL or token selects the not-configured mode; missing
//! warehouse URL or token selects synthetic data. Neither is an error.

use std::time::Duration;

use chainsim_core::LogFormat;

use crate::compute::jobs_api::ComputeConfig;
use crate::error::{Error, Result};
use crate::poll::PollConfig;
use crate::warehouse::sql_api::WarehouseConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct SimulationConfig {
    /// Compute service settings; `None` means not configured.
    pub compute: Option<ComputeConfig>,
    /// Poll interval and budget.
    pub poll: PollConfig,
    /// Warehouse settings; `None` means synthetic data.
    pub warehouse: Option<WarehouseConfig>,
    /// Fixed estimator seed.
    pub estimator_seed: Option<u64>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl SimulationConfig {
    /// Loads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let compute = match (env.string("CHAINSIM_COMPUTE_URL"), env.string("CHAINSIM_COMPUTE_TOKEN")) {
            (Some(url), Some(token)) => {
                let mut compute = ComputeConfig::new(url, token);
                if let Some(cluster_id) = env.string("CHAINSIM_COMPUTE_CLUSTER_ID") {
                    compute = compute.with_cluster_id(cluster_id);
                }
                if let Some(script) = env.string("CHAINSIM_COMPUTE_SCRIPT") {
                    compute = compute.with_script(script);
                }
                Some(compute)
            }
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("compute URL and token must both be set; running without compute service");
                None
            }
            (None, None) => None,
        };

        let interval = env
            .u64("CHAINSIM_POLL_INTERVAL_SECS")?
            .map_or(PollConfig::DEFAULT_INTERVAL, Duration::from_secs);
        let max_attempts = env
            .u32("CHAINSIM_POLL_MAX_ATTEMPTS")?
            .unwrap_or(PollConfig::DEFAULT_MAX_ATTEMPTS);
        let poll = PollConfig::new(interval, max_attempts).map_err(|e| match e {
            Error::Configuration { message } => Error::invalid_input(message),
            other => other,
        })?;

        let warehouse = match (
            env.string("CHAINSIM_WAREHOUSE_URL"),
            env.string("CHAINSIM_WAREHOUSE_TOKEN"),
        ) {
            (Some(url), Some(token)) => {
                let mut warehouse = WarehouseConfig::new(url, token);
                if let Some(name) = env.string("CHAINSIM_WAREHOUSE_NAME") {
                    warehouse = warehouse.with_warehouse(name);
                }
                if let Some(database) = env.string("CHAINSIM_WAREHOUSE_DATABASE") {
                    warehouse = warehouse.with_database(database);
                }
                if let Some(schema) = env.string("CHAINSIM_WAREHOUSE_SCHEMA") {
                    warehouse = warehouse.with_schema(schema);
                }
                Some(warehouse)
            }
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("warehouse URL and token must both be set; using synthetic data");
                None
            }
            (None, None) => None,
        };

        let log_format = match env.string("CHAINSIM_LOG_FORMAT") {
            Some(value) => value
                .parse::<LogFormat>()
                .map_err(|e| Error::invalid_input(format!("CHAINSIM_LOG_FORMAT: {e}")))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            compute,
            poll,
            warehouse,
            estimator_seed: env.u64("CHAINSIM_ESTIMATOR_SEED")?,
            log_format,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn u64(&self, name: &str) -> Result<Option<u64>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u64>()
            .map(Some)
            .map_err(|e| Error::invalid_input(format!("{name} must be a u64: {e}")))
    }

    fn u32(&self, name: &str) -> Result<Option<u32>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u32>()
            .map(Some)
            .map_err(|e| Error::invalid_input(format!("{name} must be a u32: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<SimulationConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        SimulationConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() -> Result<()> {
        let config = config_from(&[])?;
        assert!(config.compute.is_none());
        assert!(config.warehouse.is_none());
        assert_eq!(config.poll, PollConfig::default());
        assert!(config.estimator_seed.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
        Ok(())
    }

    #[test]
    fn compute_requires_url_and_token() -> Result<()> {
        let config = config_from(&[("CHAINSIM_COMPUTE_URL", "https://w")])?;
        assert!(config.compute.is_none());

        let config = config_from(&[
            ("CHAINSIM_COMPUTE_URL", "https://w"),
            ("CHAINSIM_COMPUTE_TOKEN", "dapi"),
            ("CHAINSIM_COMPUTE_CLUSTER_ID", " 0101-abc "),
        ])?;
        let compute = config.compute.unwrap();
        assert_eq!(compute.cluster_id.as_deref(), Some("0101-abc"));
        assert_eq!(compute.script, crate::compute::DEFAULT_SIMULATION_SCRIPT);
        Ok(())
    }

    #[test]
    fn blank_values_are_unset() -> Result<()> {
        let config = config_from(&[
            ("CHAINSIM_COMPUTE_URL", "https://w"),
            ("CHAINSIM_COMPUTE_TOKEN", "   "),
        ])?;
        assert!(config.compute.is_none());
        Ok(())
    }

    #[test]
    fn poll_settings_are_parsed_and_validated() -> Result<()> {
        let config = config_from(&[
            ("CHAINSIM_POLL_INTERVAL_SECS", "2"),
            ("CHAINSIM_POLL_MAX_ATTEMPTS", "3"),
        ])?;
        assert_eq!(config.poll.timeout(), Duration::from_secs(6));

        assert!(config_from(&[("CHAINSIM_POLL_MAX_ATTEMPTS", "0")]).is_err());
        let err = config_from(&[("CHAINSIM_POLL_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("CHAINSIM_POLL_INTERVAL_SECS"));
        Ok(())
    }

    #[test]
    fn warehouse_overrides_apply() -> Result<()> {
        let config = config_from(&[
            ("CHAINSIM_WAREHOUSE_URL", "https://acct"),
            ("CHAINSIM_WAREHOUSE_TOKEN", "pat"),
            ("CHAINSIM_WAREHOUSE_SCHEMA", "ANALYTICS"),
            ("CHAINSIM_ESTIMATOR_SEED", "17"),
            ("CHAINSIM_LOG_FORMAT", "json"),
        ])?;
        let warehouse = config.warehouse.unwrap();
        assert_eq!(warehouse.schema, "ANALYTICS");
        assert_eq!(warehouse.database, WarehouseConfig::DEFAULT_DATABASE);
        assert_eq!(config.estimator_seed, Some(17));
        assert_eq!(config.log_format, LogFormat::Json);
        Ok(())
    }

    #[test]
    fn bad_log_format_is_rejected() {
        assert!(config_from(&[("CHAINSIM_LOG_FORMAT", "xml")]).is_err());
    }
}
