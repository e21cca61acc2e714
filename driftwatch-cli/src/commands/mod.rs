//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, show, check, path)
//! - [`distance`] - Great-circle distance between two points
//! - [`simulate`] - Replay a recorded track through a publisher and a viewer

pub mod config;
pub mod distance;
pub mod simulate;
