//! CLI command implementations.

pub mod compare;
pub mod demo;
pub mod run;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use chainsim_flow::job::JobStatus;

use crate::OutputFormat;
use crate::runtime::Outcome;

/// Prints the outcome of each simulated scenario.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print_outcomes(outcomes: &[Outcome], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let rendered: Vec<serde_json::Value> = outcomes
                .iter()
                .map(|o| {
                    serde_json::json!({
                        "scenario": o.scenario.name,
                        "job": o.job,
                        "result": o.result,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&rendered).context("Failed to serialize outcomes")?
            );
        }
        OutputFormat::Text => {
            for outcome in outcomes {
                print_outcome(outcome);
                println!();
            }
        }
    }
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    let job = &outcome.job;
    println!("Scenario: {}", outcome.scenario.name.bold());
    println!("  Job ID:  {}", job.id);
    println!("  Status:  {}", colored_status(job.status));
    if let Some(run_id) = &job.external_run_id {
        println!("  Run:     {run_id}");
    }
    if let Some(message) = &job.error_message {
        println!("  Error:   {}", message.red());
    }

    if let Some(result) = &outcome.result {
        let metrics = &result.metrics;
        println!("  Source:  {}", result.source);
        println!("  Total cost:        {:>14.2}", result.total_cost);
        println!("  Inventory cost:    {:>14.2}", result.inventory_cost);
        println!("  Stockout cost:     {:>14.2}", result.stockout_cost);
        println!("  Service level:     {:>13.1}%", result.service_level);
        println!("  On-time delivery:  {:>13.1}%", metrics.on_time_delivery);
        println!("  Avg inventory:     {:>14.1}", metrics.average_inventory_level);
        println!("  Stockout events:   {:>14}", metrics.stockout_events);
        println!(
            "  Orders fulfilled:  {:>14}",
            format!("{}/{}", metrics.fulfilled_orders, metrics.total_orders)
        );
    }
}

/// Colors a job status for terminal output.
#[must_use]
pub fn colored_status(status: JobStatus) -> String {
    match status {
        JobStatus::Completed => status.green().to_string(),
        JobStatus::Failed => status.red().to_string(),
        JobStatus::Pending | JobStatus::Running => status.yellow().to_string(),
    }
}

/// Fails when any simulation did not complete.
///
/// # Errors
///
/// Returns an error naming the failed scenarios.
pub fn ensure_all_completed(outcomes: &[Outcome]) -> Result<()> {
    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.job.status != JobStatus::Completed)
        .map(|o| o.scenario.name.as_str())
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Simulation did not complete for: {}", failed.join(", "))
    }
}
