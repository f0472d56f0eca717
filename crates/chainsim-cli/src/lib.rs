//! # chainsim-cli
//!
//! Command-line runner for supply-chain scenario simulations.
//!
//! ## Commands
//!
//! - `chainsim run` - Simulate scenarios from JSON files
//! - `chainsim compare` - Simulate several scenarios and compare their results
//! - `chainsim demo` - Simulate the built-in "Q1 Disruption" scenario
//!
//! ## Configuration
//!
//! Service endpoints and credentials come from `CHAINSIM_*` environment
//! variables (see [`chainsim_flow::config`]). Without them the runner
//! estimates locally from synthetic data.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;
pub mod runtime;
pub mod scenario_file;

use clap::{Parser, Subcommand};

/// chainsim - supply-chain scenario simulation runner.
#[derive(Debug, Parser)]
#[command(name = "chainsim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Override the poll interval (seconds).
    #[arg(long, env = "CHAINSIM_POLL_INTERVAL_SECS")]
    pub poll_interval: Option<u64>,

    /// Fix the estimator seed for reproducible numbers.
    #[arg(long, env = "CHAINSIM_ESTIMATOR_SEED")]
    pub seed: Option<u64>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Simulate scenarios from JSON files.
    Run(commands::run::RunArgs),
    /// Simulate several scenarios and compare the results.
    Compare(commands::compare::CompareArgs),
    /// Simulate the built-in demo scenario.
    Demo(commands::demo::DemoArgs),
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_and_run_args() {
        let cli = Cli::parse_from([
            "chainsim",
            "--format",
            "json",
            "--seed",
            "7",
            "run",
            "a.json",
            "b.json",
        ]);

        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.seed, Some(7));
        match cli.command {
            Commands::Run(args) => assert_eq!(args.scenario_files.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn demo_defaults() {
        let cli = Cli::parse_from(["chainsim", "demo"]);
        assert!(matches!(cli.format, OutputFormat::Text));
        match cli.command {
            Commands::Demo(args) => assert_eq!(args.delay_days, 20),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
