//! Observability metrics for simulation jobs.
//!
//! Metrics are recorded through the `metrics` crate facade; without an
//! installed recorder every call is a no-op.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `chainsim_jobs_total` | Counter | `status` | Jobs reaching a terminal status |
//! | `chainsim_job_transitions_total` | Counter | `from_state`, `to_state` | Job status transitions |
//! | `chainsim_estimation_tier_total` | Counter | `tier` | Results produced per fallback tier |
//! | `chainsim_poll_attempts_total` | Counter | `state` | Remote state queries by observed state |
//! | `chainsim_job_duration_seconds` | Histogram | `status` | Start-to-terminal job duration |
//! | `chainsim_active_jobs` | Gauge | - | Jobs with a live execution task |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chainsim_flow::metrics::JobMetrics;
//!
//! let metrics = JobMetrics::new();
//! metrics.record_transition("pending", "running");
//! metrics.record_estimation_tier("warehouse");
//! ```

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Jobs reaching a terminal status.
    pub const JOBS_TOTAL: &str = "chainsim_jobs_total";
    /// Counter: Job status transitions.
    pub const JOB_TRANSITIONS_TOTAL: &str = "chainsim_job_transitions_total";
    /// Counter: Results produced per fallback tier.
    pub const ESTIMATION_TIER_TOTAL: &str = "chainsim_estimation_tier_total";
    /// Counter: Remote state queries.
    pub const POLL_ATTEMPTS_TOTAL: &str = "chainsim_poll_attempts_total";
    /// Histogram: Job duration in seconds.
    pub const JOB_DURATION_SECONDS: &str = "chainsim_job_duration_seconds";
    /// Gauge: Jobs with a live execution task.
    pub const ACTIVE_JOBS: &str = "chainsim_active_jobs";
}

/// Label keys used across metrics.
pub mod labels {
    /// Terminal job status.
    pub const STATUS: &str = "status";
    /// Previous job status (for transitions).
    pub const FROM_STATE: &str = "from_state";
    /// Target job status (for transitions).
    pub const TO_STATE: &str = "to_state";
    /// Remote run state.
    pub const STATE: &str = "state";
    /// Fallback tier (remote, warehouse, baseline).
    pub const TIER: &str = "tier";
}

/// High-level interface for recording job metrics.
///
/// Cheap to clone and share across job tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobMetrics;

impl JobMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Records a job status transition.
    pub fn record_transition(&self, from_state: &str, to_state: &str) {
        counter!(
            names::JOB_TRANSITIONS_TOTAL,
            labels::FROM_STATE => from_state.to_string(),
            labels::TO_STATE => to_state.to_string(),
        )
        .increment(1);
    }

    /// Records a job reaching a terminal status, with its duration.
    pub fn record_terminal(&self, status: &str, duration_secs: f64) {
        counter!(
            names::JOBS_TOTAL,
            labels::STATUS => status.to_string(),
        )
        .increment(1);
        histogram!(
            names::JOB_DURATION_SECONDS,
            labels::STATUS => status.to_string(),
        )
        .record(duration_secs);
    }

    /// Records which tier produced a result.
    pub fn record_estimation_tier(&self, tier: &str) {
        counter!(
            names::ESTIMATION_TIER_TOTAL,
            labels::TIER => tier.to_string(),
        )
        .increment(1);
    }

    /// Records one remote state query.
    pub fn record_poll_attempt(&self, state: &str) {
        counter!(
            names::POLL_ATTEMPTS_TOTAL,
            labels::STATE => state.to_string(),
        )
        .increment(1);
    }

    /// Marks a job task as started.
    pub fn job_task_started(&self) {
        gauge!(names::ACTIVE_JOBS).increment(1.0);
    }

    /// Marks a job task as finished.
    pub fn job_task_finished(&self) {
        gauge!(names::ACTIVE_JOBS).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_metrics_record_without_recorder() {
        let metrics = JobMetrics::new();

        // These calls should not panic even without a metrics recorder installed
        metrics.record_transition("pending", "running");
        metrics.record_terminal("completed", 1.5);
        metrics.record_estimation_tier("baseline");
        metrics.record_poll_attempt("unknown");
        metrics.job_task_started();
        metrics.job_task_finished();
    }
}
