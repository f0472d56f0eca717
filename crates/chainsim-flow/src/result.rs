//! Simulation results.
//!
//! A [`SimulationResult`] is the cost/service-level projection for one
//! scenario. It is created only by the orchestrator when a job completes
//! and is owned by exactly that job.
//!
//! Every result handed out satisfies:
//!
//! - `fulfilled_orders <= total_orders`
//! - percentage fields (`service_level`, `on_time_delivery`) within `[0, 100]`
//! - cost fields non-negative and finite
//!
//! [`SimulationResult::normalized`] enforces these regardless of which
//! estimation tier produced the numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chainsim_core::{JobId, ScenarioId};

/// Which stage of the fallback chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultSource {
    /// Parsed from the remote compute run's output.
    Remote,
    /// Estimated from warehouse aggregates.
    Warehouse,
    /// Synthetic baseline.
    Baseline,
}

impl ResultSource {
    /// Lowercase label for logs and metrics.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Warehouse => "warehouse",
            Self::Baseline => "baseline",
        }
    }
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Operational metrics behind the headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationMetrics {
    /// Mean on-hand units per product.
    pub average_inventory_level: f64,
    /// Number of stockouts over the horizon.
    pub stockout_events: u32,
    /// Percentage of orders delivered on time.
    pub on_time_delivery: f64,
    /// Orders placed over the horizon.
    pub total_orders: u64,
    /// Orders fulfilled over the horizon.
    pub fulfilled_orders: u64,
}

/// Cost/service-level projection for a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// Scenario the projection is for.
    pub scenario_id: ScenarioId,
    /// Scenario name at the time of the run.
    pub scenario_name: String,
    /// Job that produced the result, set when the orchestrator links it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    /// Inventory + stockout + ordering cost.
    pub total_cost: f64,
    /// Percentage of demand served.
    pub service_level: f64,
    /// Holding cost.
    pub inventory_cost: f64,
    /// Cost of stockouts.
    pub stockout_cost: f64,
    /// Supporting metrics.
    pub metrics: SimulationMetrics,
    /// Fallback tier that produced the numbers.
    pub source: ResultSource,
    /// When the owning job completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SimulationResult {
    /// Returns the result with all invariants enforced.
    ///
    /// Non-finite values collapse to 0, percentages are clamped to
    /// `[0, 100]`, costs are floored at 0 and fulfilled orders are capped at
    /// the order total.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.total_cost = non_negative(self.total_cost);
        self.inventory_cost = non_negative(self.inventory_cost);
        self.stockout_cost = non_negative(self.stockout_cost);
        self.service_level = percentage(self.service_level);
        self.metrics.on_time_delivery = percentage(self.metrics.on_time_delivery);
        self.metrics.average_inventory_level = non_negative(self.metrics.average_inventory_level);
        self.metrics.fulfilled_orders = self.metrics.fulfilled_orders.min(self.metrics.total_orders);
        self
    }

    /// Returns true if every invariant holds.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let pct = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        let cost = |v: f64| v.is_finite() && v >= 0.0;
        self.metrics.fulfilled_orders <= self.metrics.total_orders
            && pct(self.service_level)
            && pct(self.metrics.on_time_delivery)
            && cost(self.total_cost)
            && cost(self.inventory_cost)
            && cost(self.stockout_cost)
    }
}

/// Clamps a percentage to `[0, 100]`; NaN becomes 0.
#[must_use]
pub fn percentage(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_result() -> SimulationResult {
        SimulationResult {
            scenario_id: ScenarioId::generate(),
            scenario_name: "raw".into(),
            job_id: None,
            total_cost: -5.0,
            service_level: 104.2,
            inventory_cost: f64::NAN,
            stockout_cost: 1_000.0,
            metrics: SimulationMetrics {
                average_inventory_level: 1_200.0,
                stockout_events: 2,
                on_time_delivery: -1.5,
                total_orders: 100,
                fulfilled_orders: 140,
            },
            source: ResultSource::Warehouse,
            completed_at: None,
        }
    }

    #[test]
    fn normalized_enforces_invariants() {
        let raw = raw_result();
        assert!(!raw.is_consistent());

        let result = raw.normalized();
        assert!(result.is_consistent());
        assert!((result.service_level - 100.0).abs() < f64::EPSILON);
        assert!(result.metrics.on_time_delivery.abs() < f64::EPSILON);
        assert!(result.total_cost.abs() < f64::EPSILON);
        assert!(result.inventory_cost.abs() < f64::EPSILON);
        assert_eq!(result.metrics.fulfilled_orders, 100);
    }

    #[test]
    fn percentage_handles_nan() {
        assert!(percentage(f64::NAN).abs() < f64::EPSILON);
        assert!((percentage(42.0) - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn result_serializes_source_and_metrics() {
        let json = serde_json::to_value(raw_result().normalized()).unwrap();
        assert_eq!(json["source"], "WAREHOUSE");
        assert_eq!(json["metrics"]["totalOrders"], 100);
        assert!(json.get("jobId").is_none());
    }
}
