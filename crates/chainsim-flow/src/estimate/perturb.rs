//! Applies scenario perturbations to a warehouse snapshot.
//!
//! Perturbations are applied in the order they appear on the scenario:
//!
//! - supplier delays add `delay_days` to the matching supplier's lead time
//! - demand spikes scale demand rows of the matching product whose date
//!   falls inside the spike window by `1 + pct/100`
//! - inventory adjustments move the matching product's on-hand units,
//!   never below zero
//!
//! Supplier rows carry no date, so a delay applies regardless of its window.

use crate::scenario::{AdjustmentKind, Scenario};
use crate::warehouse::WarehouseSnapshot;

/// Returns `snapshot` with every perturbation of `scenario` applied.
#[must_use]
pub fn apply(scenario: &Scenario, mut snapshot: WarehouseSnapshot) -> WarehouseSnapshot {
    for delay in &scenario.supplier_delays {
        for supplier in snapshot
            .suppliers
            .iter_mut()
            .filter(|s| s.supplier_id == delay.supplier_id)
        {
            supplier.lead_time_days = supplier.lead_time_days.saturating_add(delay.delay_days);
        }
    }

    for spike in &scenario.demand_spikes {
        let factor = 1.0 + spike.percentage_increase / 100.0;
        for row in snapshot
            .demand
            .iter_mut()
            .filter(|r| r.product_id == spike.product_id && spike.window.contains(r.date))
        {
            row.demand *= factor;
        }
    }

    for adjustment in &scenario.inventory_adjustments {
        let quantity = i64::from(adjustment.quantity);
        for item in snapshot
            .inventory
            .iter_mut()
            .filter(|i| i.product_id == adjustment.product_id)
        {
            item.current_inventory = match adjustment.kind {
                AdjustmentKind::Increase => item.current_inventory.saturating_add(quantity),
                AdjustmentKind::Decrease => (item.current_inventory - quantity).max(0),
            };
        }
    }

    snapshot
}
