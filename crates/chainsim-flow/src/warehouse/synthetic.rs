//! Built-in synthetic warehouse dataset.
//!
//! Used whenever the warehouse backend is absent or a read fails:
//!
//! - 10 products `PROD-001..PROD-010`, inventory `1000 + i*100`, reorder point
//!   200, safety stock 100
//! - 5 suppliers `SUPPLIER-001..SUPPLIER-005`, lead time `5 + i` days, unit
//!   cost `10 + 2.5*i`
//! - one demand row per product per day, demand in `[100, 300)`
//!
//! Demand is drawn from a seeded [`StdRng`], so two reads with the same seed
//! and anchor date return identical rows.

use chrono::{Days, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{DemandRecord, InventoryRecord, SupplierRecord};

/// Seed used unless another is configured.
pub const DEFAULT_SYNTHETIC_SEED: u64 = 42;

const PRODUCT_COUNT: u32 = 10;

const SUPPLIER_NAMES: [&str; 5] = [
    "Acme Corp",
    "Global Supplies",
    "Best Products",
    "Quality Goods",
    "Fast Delivery Inc",
];

/// Formats a synthetic product identifier.
#[must_use]
pub fn product_id(index: u32) -> String {
    format!("PROD-{index:03}")
}

/// Formats a synthetic supplier identifier.
#[must_use]
pub fn supplier_id(index: u32) -> String {
    format!("SUPPLIER-{index:03}")
}

/// Deterministic stand-in for warehouse data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticDataset {
    seed: u64,
    anchor: Option<NaiveDate>,
}

impl Default for SyntheticDataset {
    fn default() -> Self {
        Self::new(DEFAULT_SYNTHETIC_SEED)
    }
}

impl SyntheticDataset {
    /// Creates a dataset with the given demand seed, anchored at today.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed, anchor: None }
    }

    /// Pins "today" so demand dates are reproducible.
    #[must_use]
    pub const fn anchored_at(mut self, date: NaiveDate) -> Self {
        self.anchor = Some(date);
        self
    }

    /// Synthetic inventory levels.
    #[must_use]
    pub fn inventory(&self) -> Vec<InventoryRecord> {
        (1..=PRODUCT_COUNT)
            .map(|i| InventoryRecord {
                product_id: product_id(i),
                current_inventory: 1000 + i64::from(i) * 100,
                reorder_point: 200,
                safety_stock: 100,
            })
            .collect()
    }

    /// Synthetic suppliers, each supplying one product.
    #[must_use]
    pub fn suppliers(&self) -> Vec<SupplierRecord> {
        (1_u32..)
            .zip(SUPPLIER_NAMES)
            .map(|(i, name)| SupplierRecord {
                supplier_id: supplier_id(i),
                supplier_name: name.to_string(),
                product_id: product_id(i % PRODUCT_COUNT + 1),
                lead_time_days: 5 + i32::try_from(i).unwrap_or(0),
                cost_per_unit: 10.0 + f64::from(i) * 2.5,
            })
            .collect()
    }

    /// Synthetic demand for the `window_days` days ending yesterday,
    /// ordered by product then date.
    #[must_use]
    pub fn demand_history(&self, window_days: u32) -> Vec<DemandRecord> {
        let today = self.anchor.unwrap_or_else(|| Utc::now().date_naive());
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut rows = Vec::with_capacity((PRODUCT_COUNT * window_days) as usize);

        for product in 1..=PRODUCT_COUNT {
            for day in 0..window_days {
                let Some(date) = today.checked_sub_days(Days::new(u64::from(window_days - day)))
                else {
                    continue;
                };
                rows.push(DemandRecord {
                    product_id: product_id(product),
                    date,
                    demand: f64::from(rng.gen_range(100_u32..300)),
                });
            }
        }
        rows
    }
}
