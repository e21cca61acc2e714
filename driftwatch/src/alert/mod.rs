//! Viewer alerting.
//!
//! - [`AlertConfig`] - per-viewer rules keyed by transition kind
//! - [`AlertDispatcher`] - decides what to play, owns critical-watch timers
//! - [`AlertSink`] - fire-and-forget audio/notification output

mod config;
mod dispatcher;
mod sink;

pub use config::{
    AlertConfig, AlertRule, TransitionAlerts, WatchRule, DEFAULT_BATTERY_THRESHOLD,
    DEFAULT_VOLUME, DEFAULT_WATCH_DURATION,
};
pub use dispatcher::AlertDispatcher;
pub use sink::{AlertCommand, AlertSink, ChannelAlertSink};
