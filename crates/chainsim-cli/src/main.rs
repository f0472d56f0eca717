//! chainsim CLI - run supply-chain scenario simulations.
//!
//! The main entry point for the `chainsim` binary.

use anyhow::{Context, Result};
use clap::Parser;

use chainsim_cli::runtime::apply_overrides;
use chainsim_cli::{Cli, Commands};
use chainsim_core::init_logging;
use chainsim_flow::config::SimulationConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SimulationConfig::from_env().context("Invalid CHAINSIM_* configuration")?;
    let config = apply_overrides(config, &cli)?;
    init_logging(config.log_format);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Run(args) => chainsim_cli::commands::run::execute(args, &config, cli.format).await,
            Commands::Compare(args) => {
                chainsim_cli::commands::compare::execute(args, &config, cli.format).await
            }
            Commands::Demo(args) => chainsim_cli::commands::demo::execute(args, &config, cli.format).await,
        }
    })
}
