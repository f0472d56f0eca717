//! Warehouse data access.
//!
//! The warehouse is the external, read-mostly store of inventory, supplier
//! and demand history. This module splits access into two layers:
//!
//! - [`WarehouseBackend`]: fallible wire-level adapter ([`sql_api::SqlApiWarehouse`],
//!   [`memory::InMemoryWarehouse`])
//! - [`Warehouse`]: the data source the estimator consumes; it never fails
//!
//! Every read on [`Warehouse`] independently degrades to the built-in
//! [`synthetic::SyntheticDataset`] when the backend errors or is absent. A
//! backend that answers successfully with zero rows is taken at its word.
//! [`Warehouse::save_result`] is best-effort: failures are logged and dropped.

pub mod memory;
pub mod sql_api;
pub mod synthetic;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use chainsim_core::ScenarioId;

use crate::error::Result;
use crate::result::SimulationResult;
use synthetic::SyntheticDataset;

/// Days of demand history the estimator aggregates.
pub const DEMAND_WINDOW_DAYS: u32 = 90;

/// Current stock position of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    /// Product identifier.
    pub product_id: String,
    /// Units on hand.
    pub current_inventory: i64,
    /// Level at which a reorder is triggered.
    pub reorder_point: i64,
    /// Buffer stock.
    pub safety_stock: i64,
}

/// A supplier of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierRecord {
    /// Supplier identifier.
    pub supplier_id: String,
    /// Display name.
    pub supplier_name: String,
    /// Product supplied.
    pub product_id: String,
    /// Days from order to delivery.
    pub lead_time_days: i32,
    /// Unit purchase cost.
    pub cost_per_unit: f64,
}

/// Demand observed for a product on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandRecord {
    /// Product identifier.
    pub product_id: String,
    /// Day of the observation.
    pub date: NaiveDate,
    /// Units demanded.
    pub demand: f64,
}

/// Everything the estimator reads, captured at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseSnapshot {
    /// Inventory levels.
    pub inventory: Vec<InventoryRecord>,
    /// Supplier records.
    pub suppliers: Vec<SupplierRecord>,
    /// Demand history over the window.
    pub demand: Vec<DemandRecord>,
}

impl WarehouseSnapshot {
    /// Returns true if the snapshot holds no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inventory.is_empty() && self.suppliers.is_empty() && self.demand.is_empty()
    }
}

/// Wire-level warehouse adapter.
///
/// Implementations report failures honestly; [`Warehouse`] decides how to
/// degrade.
#[async_trait]
pub trait WarehouseBackend: Send + Sync {
    /// Reads current inventory levels.
    async fn inventory(&self) -> Result<Vec<InventoryRecord>>;

    /// Reads supplier records.
    async fn suppliers(&self) -> Result<Vec<SupplierRecord>>;

    /// Reads demand history for the last `window_days` days.
    async fn demand_history(&self, window_days: u32) -> Result<Vec<DemandRecord>>;

    /// Writes a computed result.
    async fn save_result(&self, scenario_id: &ScenarioId, result: &SimulationResult) -> Result<()>;
}

/// Infallible warehouse data source consumed by the estimator.
#[derive(Clone)]
pub struct Warehouse {
    backend: Option<Arc<dyn WarehouseBackend>>,
    synthetic: SyntheticDataset,
}

impl std::fmt::Debug for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warehouse")
            .field("backend", &self.backend.as_ref().map(|_| "<WarehouseBackend>"))
            .field("synthetic", &self.synthetic)
            .finish()
    }
}

impl Warehouse {
    /// Creates a data source over a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn WarehouseBackend>) -> Self {
        Self {
            backend: Some(backend),
            synthetic: SyntheticDataset::default(),
        }
    }

    /// Creates a data source with no backend; every read is synthetic.
    #[must_use]
    pub fn synthetic_only() -> Self {
        Self {
            backend: None,
            synthetic: SyntheticDataset::default(),
        }
    }

    /// Replaces the synthetic dataset used for degradation.
    #[must_use]
    pub fn with_synthetic(mut self, synthetic: SyntheticDataset) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// Returns true if a backend is attached.
    #[must_use]
    pub const fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Current inventory levels.
    pub async fn inventory_levels(&self) -> Vec<InventoryRecord> {
        let Some(backend) = &self.backend else {
            return self.synthetic.inventory();
        };
        match backend.inventory().await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "inventory read failed; using synthetic data");
                self.synthetic.inventory()
            }
        }
    }

    /// Supplier records.
    pub async fn suppliers(&self) -> Vec<SupplierRecord> {
        let Some(backend) = &self.backend else {
            return self.synthetic.suppliers();
        };
        match backend.suppliers().await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "supplier read failed; using synthetic data");
                self.synthetic.suppliers()
            }
        }
    }

    /// Demand history for the last `window_days` days.
    pub async fn demand_history(&self, window_days: u32) -> Vec<DemandRecord> {
        let Some(backend) = &self.backend else {
            return self.synthetic.demand_history(window_days);
        };
        match backend.demand_history(window_days).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, window_days, "demand read failed; using synthetic data");
                self.synthetic.demand_history(window_days)
            }
        }
    }

    /// Reads all three collections.
    pub async fn snapshot(&self, window_days: u32) -> WarehouseSnapshot {
        let (inventory, suppliers, demand) = futures::join!(
            self.inventory_levels(),
            self.suppliers(),
            self.demand_history(window_days)
        );
        WarehouseSnapshot {
            inventory,
            suppliers,
            demand,
        }
    }

    /// Writes a result back to the warehouse, best-effort.
    pub async fn save_result(&self, scenario_id: &ScenarioId, result: &SimulationResult) {
        let Some(backend) = &self.backend else {
            tracing::debug!(scenario_id = %scenario_id, "no warehouse backend; skipping write-back");
            return;
        };
        if let Err(e) = backend.save_result(scenario_id, result).await {
            tracing::warn!(scenario_id = %scenario_id, error = %e, "warehouse write-back failed");
        }
    }
}
