//! Viewer-side alert configuration.
//!
//! Rules are keyed by [`TransitionKind`] through a fixed struct rather than
//! looked up by string, so a missing or misspelled kind is a compile error
//! and every value is validated once at load time.

use std::time::Duration;

use crate::tracking::{MovementStatus, TransitionKind};

/// Default master volume.
pub const DEFAULT_VOLUME: f64 = 0.8;

/// Default battery level below which the battery alert fires.
pub const DEFAULT_BATTERY_THRESHOLD: f64 = 0.5;

/// Default critical-watch duration.
pub const DEFAULT_WATCH_DURATION: Duration = Duration::from_secs(60 * 60);

/// What to play for one alert kind.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRule {
    pub enabled: bool,
    pub sound: String,
    /// Repeat the sound until [`AlertSink::stop_all`](super::AlertSink::stop_all).
    pub looping: bool,
}

impl AlertRule {
    pub fn new(sound: impl Into<String>) -> Self {
        Self {
            enabled: true,
            sound: sound.into(),
            looping: false,
        }
    }

    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One rule per [`TransitionKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionAlerts {
    pub moving: AlertRule,
    pub stationary: AlertRule,
    pub offline: AlertRule,
}

impl Default for TransitionAlerts {
    fn default() -> Self {
        Self {
            moving: AlertRule::new("sonar"),
            stationary: AlertRule::new("champignon-mario").looping(),
            offline: AlertRule::new("la-cucaracha"),
        }
    }
}

impl TransitionAlerts {
    pub fn get(&self, kind: TransitionKind) -> &AlertRule {
        match kind {
            TransitionKind::EnteredMoving => &self.moving,
            TransitionKind::EnteredStationary => &self.stationary,
            TransitionKind::EnteredOffline => &self.offline,
        }
    }

    pub fn get_mut(&mut self, kind: TransitionKind) -> &mut AlertRule {
        match kind {
            TransitionKind::EnteredMoving => &mut self.moving,
            TransitionKind::EnteredStationary => &mut self.stationary,
            TransitionKind::EnteredOffline => &mut self.offline,
        }
    }
}

/// Critical watch: alert once a status has persisted for `duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchRule {
    pub status: MovementStatus,
    pub duration: Duration,
    pub sound: String,
    pub looping: bool,
}

impl Default for WatchRule {
    fn default() -> Self {
        Self {
            status: MovementStatus::Stationary,
            duration: DEFAULT_WATCH_DURATION,
            sound: "grenouille".to_string(),
            looping: true,
        }
    }
}

/// Complete alert configuration for one viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertConfig {
    /// Master switch; when false nothing is played.
    pub enabled: bool,
    /// Playback volume in [0, 1].
    pub volume: f64,
    pub transitions: TransitionAlerts,
    pub battery: AlertRule,
    pub battery_threshold: f64,
    /// Played when an entity raises its emergency override, first sighting
    /// included.
    pub emergency: AlertRule,
    /// Disabled when `None`.
    pub watch: Option<WatchRule>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: DEFAULT_VOLUME,
            transitions: TransitionAlerts::default(),
            battery: AlertRule::new("alerte-urgence"),
            battery_threshold: DEFAULT_BATTERY_THRESHOLD,
            emergency: AlertRule::new("military-sms").looping(),
            watch: None,
        }
    }
}

impl AlertConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(format!("volume {} outside [0, 1]", self.volume));
        }
        if !(0.0..=1.0).contains(&self.battery_threshold) {
            return Err(format!(
                "battery threshold {} outside [0, 1]",
                self.battery_threshold
            ));
        }
        if let Some(watch) = &self.watch {
            if watch.duration.is_zero() {
                return Err("watch duration must be positive".to_string());
            }
        }
        Ok(())
    }
}
