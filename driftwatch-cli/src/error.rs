//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use driftwatch::config::ConfigFileError;
use driftwatch::geo::GeoError;
use driftwatch::publisher::PublisherError;
use driftwatch::sampler::TrackError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be read or written
    ConfigFile(ConfigFileError),
    /// Configuration values are inconsistent
    Config(String),
    /// Track file could not be loaded
    Track { path: PathBuf, error: TrackError },
    /// Coordinate argument out of range
    Coordinate(GeoError),
    /// Publisher failed during the simulation
    Publisher(PublisherError),
    /// Tokio runtime could not be built
    Runtime(std::io::Error),
    /// Failed to render output
    Output(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::ConfigFile(ConfigFileError::InvalidValue { .. }) | CliError::Config(_) => {
                eprintln!();
                eprintln!("Check the file with: driftwatch config check");
                eprintln!("Or write a fresh default one with: driftwatch config init --force");
            }
            CliError::Track { .. } => {
                eprintln!();
                eprintln!("A track file is JSON, for example:");
                eprintln!(r#"  {{ "points": [ {{ "offset_secs": 0, "lat": -22.27, "lon": 166.45 }} ] }}"#);
                eprintln!("Offsets must start at 0 and never decrease.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Track { path, error } => {
                write!(f, "Failed to load track '{}': {}", path.display(), error)
            }
            CliError::Coordinate(e) => write!(f, "{}", e),
            CliError::Publisher(e) => write!(f, "Publisher error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Output(msg) => write!(f, "Failed to render output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Track { error, .. } => Some(error),
            CliError::Coordinate(e) => Some(e),
            CliError::Publisher(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<PublisherError> for CliError {
    fn from(e: PublisherError) -> Self {
        CliError::Publisher(e)
    }
}

impl From<GeoError> for CliError {
    fn from(e: GeoError) -> Self {
        CliError::Coordinate(e)
    }
}
