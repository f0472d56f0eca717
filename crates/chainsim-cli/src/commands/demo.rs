//! Demo command - simulate the built-in "Q1 Disruption" scenario.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;

use chainsim_flow::config::SimulationConfig;
use chainsim_flow::scenario::{DateRange, Scenario, SupplierDelay};

use super::{ensure_all_completed, print_outcomes};
use crate::OutputFormat;
use crate::runtime::Runtime;

/// Arguments for the demo command.
#[derive(Debug, Args)]
pub struct DemoArgs {
    /// Extra lead-time days for the delayed supplier.
    #[arg(long, default_value = "20")]
    pub delay_days: i32,

    /// Also simulate an unperturbed baseline for comparison.
    #[arg(long)]
    pub with_baseline: bool,
}

/// Builds the demo scenario.
///
/// # Errors
///
/// Returns an error if the scenario fails validation.
pub fn q1_disruption(delay_days: i32) -> Result<Scenario> {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).context("invalid demo start date")?;
    let end = NaiveDate::from_ymd_opt(2025, 3, 31).context("invalid demo end date")?;

    let scenario = Scenario::new("Q1 Disruption")
        .with_description("Primary supplier delayed through the first quarter")
        .with_supplier_delay(SupplierDelay {
            supplier_id: "SUPPLIER-001".into(),
            supplier_name: "Acme Corp".into(),
            delay_days,
            window: DateRange::new(start, end),
        });
    scenario.validate()?;
    Ok(scenario)
}

/// Execute the demo command.
///
/// # Errors
///
/// Returns an error if the simulation fails.
pub async fn execute(args: DemoArgs, config: &SimulationConfig, format: OutputFormat) -> Result<()> {
    let mut scenarios = vec![q1_disruption(args.delay_days)?];
    if args.with_baseline {
        scenarios.push(Scenario::new("Business as usual"));
    }

    let runtime = Runtime::new(config)?;
    let outcomes = runtime.simulate(scenarios).await?;
    print_outcomes(&outcomes, format)?;
    ensure_all_completed(&outcomes)
}
