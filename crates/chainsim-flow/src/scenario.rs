//! What-if scenarios.
//!
//! A scenario is a named set of supply-chain perturbations. It is owned by
//! the caller and only read by the simulation engine; a job captures the
//! scenario it was started with and never writes it back.
//!
//! Three ordered perturbation kinds are supported:
//!
//! - **Supplier delays**: extra lead-time days for one supplier
//! - **Demand spikes**: percentage increase in demand for one product
//! - **Inventory adjustments**: on-hand quantity added to or removed from one product
//!
//! Each perturbation carries an inclusive validity [`DateRange`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use chainsim_core::ScenarioId;

use crate::error::{Error, Result};

/// Scenario lifecycle as tracked by the owning CRUD layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioStatus {
    /// Being edited.
    #[default]
    Draft,
    /// Ready to simulate.
    Active,
    /// Simulated successfully.
    Completed,
    /// Last simulation failed.
    Failed,
}

impl std::fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Inclusive date range during which a perturbation applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    /// First day the perturbation applies.
    pub start: NaiveDate,
    /// Last day the perturbation applies.
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new range.
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Returns true if `date` falls inside the range (both ends inclusive).
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    fn validate(&self, what: &str) -> Result<()> {
        if self.start > self.end {
            return Err(Error::invalid_input(format!(
                "{what}: start date {} is after end date {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Additional lead time for a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierDelay {
    /// Supplier being delayed.
    pub supplier_id: String,
    /// Display name of the supplier.
    pub supplier_name: String,
    /// Extra lead-time days.
    pub delay_days: i32,
    /// When the delay applies.
    pub window: DateRange,
}

/// Percentage increase in demand for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandSpike {
    /// Product affected.
    pub product_id: String,
    /// Display name of the product.
    pub product_name: String,
    /// Increase in percent (50.0 means demand x1.5).
    pub percentage_increase: f64,
    /// When the spike applies.
    pub window: DateRange,
}

/// Direction of an inventory adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentKind {
    /// Stock added.
    Increase,
    /// Stock removed.
    Decrease,
}

/// Change to on-hand inventory of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAdjustment {
    /// Product affected.
    pub product_id: String,
    /// Display name of the product.
    pub product_name: String,
    /// Units added or removed.
    pub quantity: u32,
    /// Whether units are added or removed.
    pub kind: AdjustmentKind,
    /// When the adjustment applies.
    pub window: DateRange,
}

/// A named set of supply-chain perturbations to simulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Unique scenario identifier.
    pub id: ScenarioId,
    /// Human-readable name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ScenarioStatus,
    /// Supplier delays, in the order they were entered.
    #[serde(default)]
    pub supplier_delays: Vec<SupplierDelay>,
    /// Demand spikes, in the order they were entered.
    #[serde(default)]
    pub demand_spikes: Vec<DemandSpike>,
    /// Inventory adjustments, in the order they were entered.
    #[serde(default)]
    pub inventory_adjustments: Vec<InventoryAdjustment>,
    /// When the scenario was created.
    pub created_at: DateTime<Utc>,
}

impl Scenario {
    /// Creates an empty draft scenario.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ScenarioId::generate(),
            name: name.into(),
            description: String::new(),
            status: ScenarioStatus::Draft,
            supplier_delays: Vec::new(),
            demand_spikes: Vec::new(),
            inventory_adjustments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a supplier delay.
    #[must_use]
    pub fn with_supplier_delay(mut self, delay: SupplierDelay) -> Self {
        self.supplier_delays.push(delay);
        self
    }

    /// Appends a demand spike.
    #[must_use]
    pub fn with_demand_spike(mut self, spike: DemandSpike) -> Self {
        self.demand_spikes.push(spike);
        self
    }

    /// Appends an inventory adjustment.
    #[must_use]
    pub fn with_inventory_adjustment(mut self, adjustment: InventoryAdjustment) -> Self {
        self.inventory_adjustments.push(adjustment);
        self
    }

    /// Total number of perturbations across all three kinds.
    #[must_use]
    pub fn perturbation_count(&self) -> usize {
        self.supplier_delays.len() + self.demand_spikes.len() + self.inventory_adjustments.len()
    }

    /// Validates the scenario.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty name, an inverted date
    /// range, a negative delay or a negative spike percentage.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_input("scenario name cannot be empty"));
        }
        for delay in &self.supplier_delays {
            delay
                .window
                .validate(&format!("supplier delay for {}", delay.supplier_id))?;
            if delay.delay_days < 0 {
                return Err(Error::invalid_input(format!(
                    "supplier delay for {} must not be negative (got {})",
                    delay.supplier_id, delay.delay_days
                )));
            }
        }
        for spike in &self.demand_spikes {
            spike
                .window
                .validate(&format!("demand spike for {}", spike.product_id))?;
            if !spike.percentage_increase.is_finite() || spike.percentage_increase < 0.0 {
                return Err(Error::invalid_input(format!(
                    "demand spike for {} must be a non-negative percentage (got {})",
                    spike.product_id, spike.percentage_increase
                )));
            }
        }
        for adjustment in &self.inventory_adjustments {
            adjustment
                .window
                .validate(&format!("inventory adjustment for {}", adjustment.product_id))?;
        }
        Ok(())
    }
}
