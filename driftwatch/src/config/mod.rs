//! User configuration (`~/.driftwatch/config.ini`).
//!
//! The INI file is parsed into a typed [`ConfigFile`] that starts from
//! defaults and is fully validated at load time, then converted into the
//! engine's [`TrackingConfig`](crate::tracking::TrackingConfig) and
//! [`AlertConfig`](crate::alert::AlertConfig).
//!
//! # Example
//!
//! ```
//! use driftwatch::config::ConfigFile;
//!
//! let config = ConfigFile::from_ini_str("[tracking]\nimmobility_radius_m = 30\n").unwrap();
//! assert_eq!(config.tracking_config().classifier.immobility_radius_m, 30.0);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{DEFAULT_LOG_FILE_NAME, DEFAULT_WATCH_MINUTES};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{AlertSettings, ConfigFile, LoggingSettings, TrackingSettings};
