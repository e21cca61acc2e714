//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types; parsing lives in [`super::parser`] and
//! serialization in [`super::writer`].

use std::path::PathBuf;
use std::time::Duration;

use crate::alert::{AlertConfig, AlertRule, TransitionAlerts, WatchRule};
use crate::tracking::{ClassifierConfig, MovementStatus, TrackingConfig};

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Movement classification and publishing
    pub tracking: TrackingSettings,
    /// Viewer alert preferences
    pub alerts: AlertSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// `[tracking]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    pub immobility_radius_m: f64,
    pub immobility_delay_secs: u64,
    pub throttle_interval_secs: u64,
    pub offline_timeout_secs: u64,
    pub fallback_interval_secs: u64,
    pub event_log_capacity: usize,
    /// `None` disables the accuracy gate.
    pub accuracy_gate_m: Option<f64>,
    pub low_accuracy_confirmations: u32,
    pub write_timeout_secs: u64,
}

/// `[alerts]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSettings {
    pub enabled: bool,
    pub volume: f64,
    pub moving: AlertRule,
    pub stationary: AlertRule,
    pub offline: AlertRule,
    pub battery: AlertRule,
    pub battery_threshold: f64,
    pub emergency: AlertRule,
    /// `None` disables the critical watch.
    pub watch_status: Option<MovementStatus>,
    pub watch_minutes: u64,
    pub watch_sound: String,
    pub watch_loop: bool,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl ConfigFile {
    /// Engine configuration for publishers and viewers.
    pub fn tracking_config(&self) -> TrackingConfig {
        let t = &self.tracking;
        TrackingConfig {
            classifier: ClassifierConfig {
                immobility_radius_m: t.immobility_radius_m,
                immobility_delay: Duration::from_secs(t.immobility_delay_secs),
                accuracy_gate_m: t.accuracy_gate_m,
                low_accuracy_confirmations: t.low_accuracy_confirmations,
            },
            throttle_interval: Duration::from_secs(t.throttle_interval_secs),
            offline_timeout: Duration::from_secs(t.offline_timeout_secs),
            fallback_interval: Duration::from_secs(t.fallback_interval_secs),
            event_log_capacity: t.event_log_capacity,
            write_timeout: Duration::from_secs(t.write_timeout_secs),
        }
    }

    /// Alert rules for a viewer's dispatcher.
    pub fn alert_config(&self) -> AlertConfig {
        let a = &self.alerts;
        AlertConfig {
            enabled: a.enabled,
            volume: a.volume,
            transitions: TransitionAlerts {
                moving: a.moving.clone(),
                stationary: a.stationary.clone(),
                offline: a.offline.clone(),
            },
            battery: a.battery.clone(),
            battery_threshold: a.battery_threshold,
            emergency: a.emergency.clone(),
            watch: a.watch_status.map(|status| WatchRule {
                status,
                duration: Duration::from_secs(a.watch_minutes * 60),
                sound: a.watch_sound.clone(),
                looping: a.watch_loop,
            }),
        }
    }
}
