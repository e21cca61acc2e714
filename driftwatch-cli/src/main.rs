//! driftwatch CLI - Command-line interface
//!
//! This binary exercises the driftwatch library: it replays recorded tracks
//! through a publisher and a viewer, measures distances, and manages the
//! configuration file.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::distance::DistanceArgs;
use commands::simulate::SimulateArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "driftwatch")]
#[command(version = driftwatch::VERSION)]
#[command(about = "Real-time position tracking and movement alerts", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.driftwatch/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded track through a publisher and a session viewer
    Simulate(SimulateArgs),

    /// Great-circle distance between two points
    Distance(DistanceArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        e.exit();
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Simulate(args) => {
            let runner = CliRunner::new(cli.config.as_deref(), !args.json)?;
            commands::simulate::run(args, runner)
        }
        Commands::Distance(args) => commands::distance::run(args),
        Commands::Config(command) => commands::config::run(command, cli.config.as_deref()),
    }
}
