//! Run command - simulate scenarios from definition files.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use chainsim_flow::config::SimulationConfig;

use super::{ensure_all_completed, print_outcomes};
use crate::OutputFormat;
use crate::runtime::Runtime;
use crate::scenario_file::ScenarioFile;

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Scenario definition files (JSON).
    #[arg(required = true)]
    pub scenario_files: Vec<PathBuf>,
}

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if a scenario file is invalid or any simulation fails.
pub async fn execute(args: RunArgs, config: &SimulationConfig, format: OutputFormat) -> Result<()> {
    let scenarios = args
        .scenario_files
        .iter()
        .map(|path| ScenarioFile::load(path)?.into_scenario())
        .collect::<Result<Vec<_>>>()?;

    let runtime = Runtime::new(config)?;
    let outcomes = runtime.simulate(scenarios).await?;
    print_outcomes(&outcomes, format)?;
    ensure_all_completed(&outcomes)
}
