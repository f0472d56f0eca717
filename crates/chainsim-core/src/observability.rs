//! Observability infrastructure for chainsim.
//!
//! Structured logging with consistent spans. Every simulation job runs
//! inside a span carrying its job and scenario identifiers so that log
//! lines from concurrent jobs can be told apart.

use std::str::FromStr;
use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Error;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(Error::InvalidInput(format!(
                "log format must be one of: json, pretty (got {other})"
            ))),
        }
    }
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops. Logs go to stderr so stdout stays free for
/// command output.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `chainsim_flow=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty().with_writer(std::io::stderr))
                    .init();
            }
        }
    });
}

/// Creates a span for simulation job operations.
///
/// # Example
///
/// ```rust
/// use chainsim_core::observability::simulation_span;
///
/// let span = simulation_span("execute", "01J0000000000000000000000", "01J0000000000000000000001");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn simulation_span(operation: &str, job_id: &str, scenario_id: &str) -> Span {
    tracing::info_span!(
        "simulation",
        op = operation,
        job_id = job_id,
        scenario_id = scenario_id,
    )
}
