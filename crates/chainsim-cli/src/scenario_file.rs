//! Scenario definition files.
//!
//! A scenario file is JSON with a name and any number of perturbations:
//!
//! ```json
//! {
//!   "name": "Q1 Disruption",
//!   "supplierDelays": [{
//!     "supplierId": "SUPPLIER-001",
//!     "supplierName": "Acme Corp",
//!     "delayDays": 20,
//!     "window": { "start": "2025-01-01", "end": "2025-03-31" }
//!   }]
//! }
//! ```
//!
//! Identifiers and timestamps are assigned on load.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use chainsim_flow::scenario::{DemandSpike, InventoryAdjustment, Scenario, SupplierDelay};

/// On-disk scenario definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScenarioFile {
    /// Scenario name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Supplier delays.
    #[serde(default)]
    pub supplier_delays: Vec<SupplierDelay>,
    /// Demand spikes.
    #[serde(default)]
    pub demand_spikes: Vec<DemandSpike>,
    /// Inventory adjustments.
    #[serde(default)]
    pub inventory_adjustments: Vec<InventoryAdjustment>,
}

impl ScenarioFile {
    /// Parses a scenario definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid scenario definition")
    }

    /// Reads and parses a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        Self::parse(&json).with_context(|| format!("In {}", path.display()))
    }

    /// Builds a fresh, validated scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario fails validation.
    pub fn into_scenario(self) -> Result<Scenario> {
        let mut scenario = Scenario::new(self.name).with_description(self.description);
        scenario.supplier_delays = self.supplier_delays;
        scenario.demand_spikes = self.demand_spikes;
        scenario.inventory_adjustments = self.inventory_adjustments;
        scenario.validate()?;
        Ok(scenario)
    }
}
