//! Compare command - simulate scenarios and compare their results.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use chainsim_core::ScenarioId;
use chainsim_flow::config::SimulationConfig;
use chainsim_flow::result::SimulationResult;

use super::print_outcomes;
use crate::OutputFormat;
use crate::runtime::Runtime;
use crate::scenario_file::ScenarioFile;

/// Arguments for the compare command.
#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Scenario definition files (JSON); at least two.
    #[arg(required = true, num_args = 2..)]
    pub scenario_files: Vec<PathBuf>,

    /// Also print each job's details.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Execute the compare command.
///
/// Scenarios whose simulation failed are left out of the comparison.
///
/// # Errors
///
/// Returns an error if a scenario file is invalid or no simulation completed.
pub async fn execute(args: CompareArgs, config: &SimulationConfig, format: OutputFormat) -> Result<()> {
    let scenarios = args
        .scenario_files
        .iter()
        .map(|path| ScenarioFile::load(path)?.into_scenario())
        .collect::<Result<Vec<_>>>()?;
    let ids: Vec<ScenarioId> = scenarios.iter().map(|s| s.id).collect();

    let runtime = Runtime::new(config)?;
    let outcomes = runtime.simulate(scenarios).await?;
    if args.verbose {
        print_outcomes(&outcomes, format)?;
    }

    let results = runtime.orchestrator().compare_results(&ids).await?;
    if results.is_empty() {
        anyhow::bail!("No simulation completed; nothing to compare");
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&results).context("Failed to serialize comparison")?
        ),
        OutputFormat::Text => print_comparison(&results),
    }
    Ok(())
}

fn print_comparison(results: &[SimulationResult]) {
    println!(
        "{:<28} {:>14} {:>10} {:>10} {:>10}",
        "SCENARIO", "TOTAL COST", "SERVICE %", "ON-TIME %", "SOURCE"
    );
    for result in results {
        println!(
            "{:<28} {:>14.2} {:>10.1} {:>10.1} {:>10}",
            truncate(&result.scenario_name, 28),
            result.total_cost,
            result.service_level,
            result.metrics.on_time_delivery,
            result.source
        );
    }

    if let Some(cheapest) = results
        .iter()
        .min_by(|a, b| a.total_cost.total_cmp(&b.total_cost))
    {
        println!();
        println!("Lowest total cost: {}", cheapest.scenario_name);
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let mut cut: String = value.chars().take(width.saturating_sub(1)).collect();
        cut.push('~');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_names() {
        assert_eq!(truncate("Q1 Disruption", 28), "Q1 Disruption");
        assert_eq!(truncate("abcdef", 4), "abc~");
    }
}
