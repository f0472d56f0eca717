//! In-memory warehouse backend for testing.
//!
//! [`InMemoryWarehouse`] serves a fixed [`WarehouseSnapshot`] and records
//! every written result. Individual reads (and the write-back) can be made to
//! fail so tests can force each degradation path.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use chainsim_core::ScenarioId;

use super::{DemandRecord, InventoryRecord, SupplierRecord, WarehouseBackend, WarehouseSnapshot};
use crate::error::{Error, Result};
use crate::result::SimulationResult;

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("warehouse lock poisoned")
}

#[derive(Debug, Default, Clone, Copy)]
struct Failures {
    inventory: bool,
    suppliers: bool,
    demand: bool,
    save: bool,
}

/// In-memory warehouse backend.
#[derive(Debug, Default)]
pub struct InMemoryWarehouse {
    snapshot: WarehouseSnapshot,
    failures: Failures,
    saved: RwLock<Vec<(ScenarioId, SimulationResult)>>,
}

impl InMemoryWarehouse {
    /// Creates a backend serving `snapshot`.
    #[must_use]
    pub fn new(snapshot: WarehouseSnapshot) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }

    /// Creates a backend that answers every read with zero rows.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Makes inventory reads fail.
    #[must_use]
    pub const fn failing_inventory(mut self) -> Self {
        self.failures.inventory = true;
        self
    }

    /// Makes supplier reads fail.
    #[must_use]
    pub const fn failing_suppliers(mut self) -> Self {
        self.failures.suppliers = true;
        self
    }

    /// Makes demand reads fail.
    #[must_use]
    pub const fn failing_demand(mut self) -> Self {
        self.failures.demand = true;
        self
    }

    /// Makes every read fail.
    #[must_use]
    pub const fn unreachable(self) -> Self {
        self.failing_inventory().failing_suppliers().failing_demand()
    }

    /// Makes the write-back fail.
    #[must_use]
    pub const fn failing_save(mut self) -> Self {
        self.failures.save = true;
        self
    }

    /// Results written so far, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn saved_results(&self) -> Result<Vec<(ScenarioId, SimulationResult)>> {
        let saved = self.saved.read().map_err(poison_err)?;
        Ok(saved.clone())
    }
}

fn unreachable_err(what: &str) -> Error {
    Error::storage(format!("warehouse unreachable while reading {what}"))
}

#[async_trait]
impl WarehouseBackend for InMemoryWarehouse {
    async fn inventory(&self) -> Result<Vec<InventoryRecord>> {
        if self.failures.inventory {
            return Err(unreachable_err("inventory"));
        }
        Ok(self.snapshot.inventory.clone())
    }

    async fn suppliers(&self) -> Result<Vec<SupplierRecord>> {
        if self.failures.suppliers {
            return Err(unreachable_err("suppliers"));
        }
        Ok(self.snapshot.suppliers.clone())
    }

    async fn demand_history(&self, _window_days: u32) -> Result<Vec<DemandRecord>> {
        if self.failures.demand {
            return Err(unreachable_err("demand history"));
        }
        Ok(self.snapshot.demand.clone())
    }

    async fn save_result(&self, scenario_id: &ScenarioId, result: &SimulationResult) -> Result<()> {
        if self.failures.save {
            return Err(Error::storage("warehouse rejected result write"));
        }
        let mut saved = self.saved.write().map_err(poison_err)?;
        saved.push((*scenario_id, result.clone()));
        drop(saved);
        Ok(())
    }
}
