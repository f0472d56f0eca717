//! Result derivation fallback chain.
//!
//! [`ResultEstimator`] turns whatever inputs are available into a
//! [`SimulationResult`], trying three tiers in order:
//!
//! 1. **Remote**: parse the compute run's output via a [`RemoteOutputReader`]
//! 2. **Warehouse**: estimate from warehouse aggregates (see [`Aggregates`])
//! 3. **Baseline**: synthetic values within fixed ranges; cannot fail
//!
//! A tier that cannot produce a result demotes to the next one with a
//! warning. Nothing escapes the chain.
//!
//! ## Randomness
//!
//! Tier 2 jitter and tier 3 values come from a [`StdRng`]. With a seed
//! configured, every estimation starts from `StdRng::seed_from_u64(seed)`, so
//! identical snapshots yield identical results. Without one the generator is
//! seeded from OS entropy.

pub mod perturb;

use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use chainsim_core::ScenarioId;

use crate::compute::RunHandle;
use crate::result::{ResultSource, SimulationMetrics, SimulationResult, percentage};
use crate::scenario::Scenario;
use crate::warehouse::{DEMAND_WINDOW_DAYS, Warehouse, WarehouseSnapshot};

/// Days the warehouse estimate projects orders over.
pub const SIMULATION_HORIZON_DAYS: f64 = 90.0;

/// Cost attributed to each stockout event.
pub const STOCKOUT_EVENT_COST: f64 = 1000.0;

const DEFAULT_LEAD_TIME_DAYS: f64 = 7.0;
const DEFAULT_COST_PER_UNIT: f64 = 12.0;

/// Why a tier could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EstimateError {
    /// The tier exists as an extension point but has no implementation.
    #[error("not yet implemented: {what}")]
    NotImplemented {
        /// What is missing.
        what: String,
    },
    /// The inputs do not support an estimate.
    #[error("insufficient data: {message}")]
    InsufficientData {
        /// What was missing.
        message: String,
    },
    /// An aggregate came out non-finite.
    #[error("invalid aggregate: {message}")]
    InvalidAggregate {
        /// Which aggregate.
        message: String,
    },
    /// Remote output exists but could not be read or parsed.
    #[error("remote output unreadable: {message}")]
    RemoteOutput {
        /// Description of the failure.
        message: String,
    },
}

/// Reads and parses the output of a finished remote run (tier 1).
#[async_trait]
pub trait RemoteOutputReader: Send + Sync {
    /// Returns the result the remote run produced for `scenario`.
    ///
    /// # Errors
    ///
    /// Returns an [`EstimateError`] when no usable output exists; the chain
    /// then falls through to the warehouse tier.
    async fn read_output(
        &self,
        handle: &RunHandle,
        scenario: &Scenario,
    ) -> std::result::Result<SimulationResult, EstimateError>;
}

/// Remote output reader for deployments where run output is not retrievable.
///
/// Always reports [`EstimateError::NotImplemented`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRemoteOutput;

#[async_trait]
impl RemoteOutputReader for UnavailableRemoteOutput {
    async fn read_output(
        &self,
        _handle: &RunHandle,
        _scenario: &Scenario,
    ) -> std::result::Result<SimulationResult, EstimateError> {
        Err(EstimateError::NotImplemented {
            what: "remote run output retrieval".into(),
        })
    }
}

/// Warehouse-derived inputs to the tier 2 formulas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregates {
    /// Mean on-hand units per product.
    pub average_inventory: f64,
    /// Mean demand per product per day.
    pub average_daily_demand: f64,
    /// Mean supplier lead time (7 when there are no suppliers).
    pub average_lead_time_days: f64,
    /// Mean unit cost (12 when there are no suppliers).
    pub average_cost_per_unit: f64,
}

impl Aggregates {
    /// Aggregates a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EstimateError::InsufficientData`] if there are no inventory
    /// or no demand rows, and [`EstimateError::InvalidAggregate`] if any mean
    /// is not finite.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_snapshot(snapshot: &WarehouseSnapshot) -> std::result::Result<Self, EstimateError> {
        if snapshot.inventory.is_empty() {
            return Err(EstimateError::InsufficientData {
                message: "no inventory records".into(),
            });
        }
        if snapshot.demand.is_empty() {
            return Err(EstimateError::InsufficientData {
                message: "no demand history".into(),
            });
        }

        let mean = |sum: f64, count: usize| sum / count as f64;

        let average_inventory = mean(
            snapshot
                .inventory
                .iter()
                .map(|r| r.current_inventory as f64)
                .sum(),
            snapshot.inventory.len(),
        );
        let average_daily_demand = mean(
            snapshot.demand.iter().map(|r| r.demand).sum(),
            snapshot.demand.len(),
        );
        let (average_lead_time_days, average_cost_per_unit) = if snapshot.suppliers.is_empty() {
            (DEFAULT_LEAD_TIME_DAYS, DEFAULT_COST_PER_UNIT)
        } else {
            let count = snapshot.suppliers.len();
            (
                mean(
                    snapshot
                        .suppliers
                        .iter()
                        .map(|s| f64::from(s.lead_time_days))
                        .sum(),
                    count,
                ),
                mean(snapshot.suppliers.iter().map(|s| s.cost_per_unit).sum(), count),
            )
        };

        let aggregates = Self {
            average_inventory,
            average_daily_demand,
            average_lead_time_days,
            average_cost_per_unit,
        };
        aggregates.check_finite()?;
        Ok(aggregates)
    }

    fn check_finite(&self) -> std::result::Result<(), EstimateError> {
        for (name, value) in [
            ("average_inventory", self.average_inventory),
            ("average_daily_demand", self.average_daily_demand),
            ("average_lead_time_days", self.average_lead_time_days),
            ("average_cost_per_unit", self.average_cost_per_unit),
        ] {
            if !value.is_finite() {
                return Err(EstimateError::InvalidAggregate {
                    message: format!("{name} is {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Rounds a non-negative quantity to a count; non-finite or negative input is 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// Three-tier result derivation.
#[derive(Clone)]
pub struct ResultEstimator {
    remote: Arc<dyn RemoteOutputReader>,
    warehouse: Warehouse,
    seed: Option<u64>,
    window_days: u32,
}

impl std::fmt::Debug for ResultEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultEstimator")
            .field("remote", &"<RemoteOutputReader>")
            .field("warehouse", &self.warehouse)
            .field("seed", &self.seed)
            .field("window_days", &self.window_days)
            .finish()
    }
}

impl ResultEstimator {
    /// Creates an estimator over a warehouse, with no remote output reader.
    #[must_use]
    pub fn new(warehouse: Warehouse) -> Self {
        Self {
            remote: Arc::new(UnavailableRemoteOutput),
            warehouse,
            seed: None,
            window_days: DEMAND_WINDOW_DAYS,
        }
    }

    /// Sets the tier 1 reader.
    #[must_use]
    pub fn with_remote_output(mut self, reader: Arc<dyn RemoteOutputReader>) -> Self {
        self.remote = reader;
        self
    }

    /// Fixes the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns the warehouse this estimator reads.
    #[must_use]
    pub const fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    fn rng(&self) -> StdRng {
        self.seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
    }

    /// Runs the fallback chain.
    ///
    /// `handle` is the run that finished remotely, if any; tier 1 is only
    /// attempted for real (non-placeholder) handles.
    #[tracing::instrument(skip_all, fields(scenario_id = %scenario.id))]
    pub async fn estimate(&self, scenario: &Scenario, handle: Option<&RunHandle>) -> SimulationResult {
        if let Some(handle) = handle.filter(|h| !h.is_placeholder()) {
            match self.remote.read_output(handle, scenario).await {
                Ok(result) => {
                    tracing::info!(tier = "remote", "derived result from remote output");
                    return SimulationResult {
                        source: ResultSource::Remote,
                        ..result
                    }
                    .normalized();
                }
                Err(EstimateError::NotImplemented { what }) => {
                    tracing::debug!(%what, "remote output tier unavailable; using warehouse estimate");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "remote output tier failed; using warehouse estimate");
                }
            }
        }

        let snapshot = self.warehouse.snapshot(self.window_days).await;
        let perturbed = perturb::apply(scenario, snapshot);

        match self.estimate_from_snapshot(scenario, &perturbed) {
            Ok(result) => {
                tracing::info!(tier = "warehouse", "derived result from warehouse estimate");
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "warehouse estimate failed; using synthetic baseline");
                self.baseline(scenario)
            }
        }
    }

    /// Tier 2: estimates a result from a (perturbed) snapshot.
    ///
    /// # Errors
    ///
    /// Returns an [`EstimateError`] if the snapshot cannot be aggregated.
    pub fn estimate_from_snapshot(
        &self,
        scenario: &Scenario,
        snapshot: &WarehouseSnapshot,
    ) -> std::result::Result<SimulationResult, EstimateError> {
        let aggregates = Aggregates::from_snapshot(snapshot)?;
        let mut rng = self.rng();
        Ok(Self::warehouse_estimate(scenario, &aggregates, &mut rng))
    }

    fn warehouse_estimate(
        scenario: &Scenario,
        aggregates: &Aggregates,
        rng: &mut StdRng,
    ) -> SimulationResult {
        let avg_inventory = aggregates.average_inventory;
        let avg_cost = aggregates.average_cost_per_unit;

        let inventory_factor = (avg_inventory / 1000.0).min(2.0);
        let service_level = percentage(85.0 + inventory_factor * 10.0 + rng.gen_range(-2.5..2.5));
        let inventory_cost = avg_inventory * avg_cost * 0.10;
        let stockout_risk = (1.0 - inventory_factor * 0.5).max(0.0);
        let stockout_events = round_count(stockout_risk * 15.0 * (1.0 - service_level / 100.0));
        #[allow(clippy::cast_precision_loss)]
        let stockout_cost = stockout_events as f64 * STOCKOUT_EVENT_COST;
        let total_orders = round_count(aggregates.average_daily_demand * SIMULATION_HORIZON_DAYS);
        #[allow(clippy::cast_precision_loss)]
        let fulfilled_orders = round_count(total_orders as f64 * service_level / 100.0);
        let on_time_delivery = (service_level - rng.gen_range(0.0..3.0)).max(0.0);
        #[allow(clippy::cast_precision_loss)]
        let total_cost = inventory_cost + stockout_cost + total_orders as f64 * avg_cost * 0.05;

        SimulationResult {
            scenario_id: scenario.id,
            scenario_name: scenario.name.clone(),
            job_id: None,
            total_cost,
            service_level,
            inventory_cost,
            stockout_cost,
            metrics: SimulationMetrics {
                average_inventory_level: avg_inventory,
                stockout_events: u32::try_from(stockout_events).unwrap_or(u32::MAX),
                on_time_delivery,
                total_orders,
                fulfilled_orders,
            },
            source: ResultSource::Warehouse,
            completed_at: None,
        }
        .normalized()
    }

    /// Tier 3: synthetic baseline.
    #[must_use]
    pub fn baseline(&self, scenario: &Scenario) -> SimulationResult {
        Self::baseline_with(scenario.id, &scenario.name, &mut self.rng())
    }

    fn baseline_with(scenario_id: ScenarioId, name: &str, rng: &mut StdRng) -> SimulationResult {
        let total_orders: u64 = 1000;
        let on_time_delivery = rng.gen_range(90.0..100.0);
        let fulfilled_orders = round_count(1000.0 * on_time_delivery / 100.0);

        SimulationResult {
            scenario_id,
            scenario_name: name.to_string(),
            job_id: None,
            total_cost: rng.gen_range(100_000.0..150_000.0),
            service_level: rng.gen_range(90.0..100.0),
            inventory_cost: rng.gen_range(50_000.0..70_000.0),
            stockout_cost: rng.gen_range(5_000.0..10_000.0),
            metrics: SimulationMetrics {
                average_inventory_level: rng.gen_range(1_000.0..1_500.0),
                stockout_events: rng.gen_range(0..20),
                on_time_delivery,
                total_orders,
                fulfilled_orders,
            },
            source: ResultSource::Baseline,
            completed_at: None,
        }
        .normalized()
    }

    /// Writes a result back to the warehouse; failures are logged and dropped.
    pub async fn write_back(&self, scenario_id: &ScenarioId, result: &SimulationResult) {
        self.warehouse.save_result(scenario_id, result).await;
    }
}
