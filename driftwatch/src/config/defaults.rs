//! Default values for every configuration section.

use super::settings::*;
use crate::alert::{AlertConfig, WatchRule};
use crate::tracking::TrackingConfig;

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "driftwatch.log";

/// Default critical-watch duration in minutes.
pub const DEFAULT_WATCH_MINUTES: u64 = 60;

// =============================================================================
// ConfigFile::default()
// =============================================================================

impl Default for ConfigFile {
    fn default() -> Self {
        let tracking = TrackingConfig::default();
        let alerts = AlertConfig::default();
        let watch = WatchRule::default();

        Self {
            tracking: TrackingSettings {
                immobility_radius_m: tracking.classifier.immobility_radius_m,
                immobility_delay_secs: tracking.classifier.immobility_delay.as_secs(),
                throttle_interval_secs: tracking.throttle_interval.as_secs(),
                offline_timeout_secs: tracking.offline_timeout.as_secs(),
                fallback_interval_secs: tracking.fallback_interval.as_secs(),
                event_log_capacity: tracking.event_log_capacity,
                accuracy_gate_m: tracking.classifier.accuracy_gate_m,
                low_accuracy_confirmations: tracking.classifier.low_accuracy_confirmations,
                write_timeout_secs: tracking.write_timeout.as_secs(),
            },
            alerts: AlertSettings {
                enabled: alerts.enabled,
                volume: alerts.volume,
                moving: alerts.transitions.moving,
                stationary: alerts.transitions.stationary,
                offline: alerts.transitions.offline,
                battery: alerts.battery,
                battery_threshold: alerts.battery_threshold,
                emergency: alerts.emergency,
                watch_status: None,
                watch_minutes: DEFAULT_WATCH_MINUTES,
                watch_sound: watch.sound,
                watch_loop: watch.looping,
            },
            logging: LoggingSettings {
                file: super::file::config_directory().join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}
