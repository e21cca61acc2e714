//! Configuration management CLI commands.
//!
//! Provides `config init`, `config show`, `config check` and `config path`.
//! Every command honors the global `--config` path.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use driftwatch::config::{config_file_path, ConfigFile};

use crate::error::CliError;
use crate::runner::{load_config, validate};

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration (defaults merged with the file)
    Show,

    /// Validate the configuration file
    Check,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => run_init(config_path, force),
        ConfigCommands::Show => run_show(config_path),
        ConfigCommands::Check => run_check(config_path),
        ConfigCommands::Path => run_path(config_path),
    }
}

fn resolve(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path)
}

fn run_init(config_path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = resolve(config_path);

    if path.exists() && !force {
        println!("Configuration already exists at {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn run_show(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    print!("{}", config.to_ini_string());
    Ok(())
}

fn run_check(config_path: Option<&Path>) -> Result<(), CliError> {
    let path = resolve(config_path);
    if !path.exists() {
        println!("No configuration file at {}; defaults apply.", path.display());
        return Ok(());
    }

    let config = load_config(Some(&path))?;
    validate(&config)?;
    println!("Configuration OK: {}", path.display());
    Ok(())
}

fn run_path(config_path: Option<&Path>) -> Result<(), CliError> {
    println!("{}", resolve(config_path).display());
    Ok(())
}
