//! CLI runner for common setup.
//!
//! Encapsulates configuration loading, logging initialization and runtime
//! construction so command handlers stay focused on their own work.

use std::path::Path;

use tracing::info;

use driftwatch::config::ConfigFile;
use driftwatch::logging::{init_logging_at, LoggingGuard};

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load config (default path unless `config_path` is given), validate it,
    /// and start logging to the configured file.
    ///
    /// Console logging is disabled when the command prints machine-readable
    /// output on stdout.
    pub fn new(config_path: Option<&Path>, stdout_enabled: bool) -> Result<Self, CliError> {
        let config = load_config(config_path)?;
        validate(&config)?;

        let logging_guard = init_logging_at(&config.logging.file, stdout_enabled)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("driftwatch v{}", driftwatch::VERSION);
        info!(log_file = %self.config.logging.file.display(), "driftwatch CLI: {} command", command);
    }

    /// Build the runtime a command runs on.
    ///
    /// A paused runtime auto-advances its clock whenever every task is idle,
    /// so a recorded track replays instantly with unchanged timing. Pausing
    /// needs tokio's `test-util` feature, which is why the CLI enables it.
    pub fn runtime(&self, realtime: bool) -> Result<tokio::runtime::Runtime, CliError> {
        let mut builder = if realtime {
            tokio::runtime::Builder::new_multi_thread()
        } else {
            let mut builder = tokio::runtime::Builder::new_current_thread();
            builder.start_paused(true);
            builder
        };
        builder.enable_all().build().map_err(CliError::Runtime)
    }
}

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load()?),
    }
}

/// Check cross-field constraints of the tracking and alert settings.
pub fn validate(config: &ConfigFile) -> Result<(), CliError> {
    config
        .tracking_config()
        .validate()
        .map_err(|reason| CliError::Config(format!("[tracking] {}", reason)))?;
    config
        .alert_config()
        .validate()
        .map_err(|reason| CliError::Config(format!("[alerts] {}", reason)))?;
    Ok(())
}
