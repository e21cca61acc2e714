//! Core state types for entity tracking.
//!
//! This module defines the fundamental types used throughout the tracking
//! engine:
//!
//! - [`MovementStatus`] - MOVING / STATIONARY / OFFLINE
//! - [`PositionSample`] - One raw reading from the positioning sensor
//! - [`EntityProfile`] - Identity and cosmetics chosen by the publisher
//! - [`TrackedEntityState`] - The record written to the shared store
//! - [`StatusEvent`] - Immutable entry of the event history
//! - [`Transition`] / [`TransitionKind`] - A detected status change

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Movement status of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementStatus {
    /// Drifted beyond the immobility radius since the anchor was set.
    Moving,
    /// Held within the immobility radius for at least the immobility delay.
    Stationary,
    /// No fresh update within the offline timeout, or sharing stopped.
    Offline,
}

impl MovementStatus {
    /// Parse a lowercase status name as used in config files.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "moving" => Some(Self::Moving),
            "stationary" => Some(Self::Stationary),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    /// Lowercase name, the inverse of [`MovementStatus::parse`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moving => "moving",
            Self::Stationary => "stationary",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for MovementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moving => write!(f, "MOVING"),
            Self::Stationary => write!(f, "STATIONARY"),
            Self::Offline => write!(f, "OFFLINE"),
        }
    }
}

/// Where a sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleOrigin {
    /// Positioning sensor (push callback or interval poll).
    #[default]
    Sensor,
    /// User repositioned the marker by hand. Published without throttling.
    Manual,
}

/// One raw reading from the positioning sensor.
///
/// Samples are ephemeral: they are consumed into a [`TrackedEntityState`]
/// update and never stored directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub position: Coordinate,

    /// Horizontal accuracy radius reported by the sensor, in meters.
    #[serde(default)]
    pub accuracy_m: Option<f64>,

    pub captured_at: DateTime<Utc>,

    /// Device battery level in `[0, 1]` when the platform reports it.
    #[serde(default)]
    pub battery_level: Option<f64>,

    #[serde(default)]
    pub charging: Option<bool>,

    #[serde(default)]
    pub origin: SampleOrigin,
}

impl PositionSample {
    /// Create a sensor sample with no accuracy or battery information.
    pub fn new(lat: f64, lon: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            position: Coordinate { lat, lon },
            accuracy_m: None,
            captured_at,
            battery_level: None,
            charging: None,
            origin: SampleOrigin::Sensor,
        }
    }

    /// Create a manual (marker drag) sample.
    pub fn manual(lat: f64, lon: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            origin: SampleOrigin::Manual,
            ..Self::new(lat, lon, captured_at)
        }
    }

    /// Attach a reported accuracy.
    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    /// Attach battery information.
    pub fn with_battery(mut self, level: f64, charging: bool) -> Self {
        self.battery_level = Some(level.clamp(0.0, 1.0));
        self.charging = Some(charging);
        self
    }

    /// Check whether this sample carries a usable position.
    pub fn is_valid(&self) -> bool {
        self.position.is_valid() && self.accuracy_m.map_or(true, |a| a.is_finite() && a >= 0.0)
    }

    pub fn is_manual(&self) -> bool {
        self.origin == SampleOrigin::Manual
    }
}

/// Identity and cosmetics chosen by the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProfile {
    /// Stable identifier, e.g. a session-scoped code such as `"BOAT-7"`.
    pub entity_id: String,

    /// Group (fleet or hunting session) this entity publishes into.
    #[serde(default)]
    pub session_id: Option<String>,

    pub display_name: String,

    #[serde(default)]
    pub icon_id: Option<String>,

    #[serde(default)]
    pub color_id: Option<String>,
}

impl EntityProfile {
    /// Create a profile with the id doubling as display name.
    pub fn new(entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        Self {
            display_name: entity_id.clone(),
            entity_id,
            session_id: None,
            icon_id: None,
            color_id: None,
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

/// Latest state of one tracked entity, as held by the shared store.
///
/// Exclusively owned and written by the entity's publisher; viewers only
/// ever see read-only copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntityState {
    pub entity_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub icon_id: Option<String>,
    #[serde(default)]
    pub color_id: Option<String>,

    /// Whether the entity is currently publishing.
    pub is_sharing: bool,

    /// Ghost mode: hidden from the group, visible to the privileged viewer.
    #[serde(default)]
    pub is_ghost: bool,

    /// Forces group visibility regardless of `is_ghost` until cleared.
    #[serde(default)]
    pub emergency_override: bool,

    /// Reference point drift is measured against.
    pub anchor: Option<Coordinate>,
    pub anchor_set_at: Option<DateTime<Utc>>,

    pub status: MovementStatus,
    pub last_position: Option<Coordinate>,

    #[serde(default)]
    pub accuracy_m: Option<f64>,

    /// Last time this record was actually written to the store.
    pub last_published_at: Option<DateTime<Utc>>,

    /// Last time a sample was observed locally by the publisher.
    pub last_active_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub charging: Option<bool>,
}

impl TrackedEntityState {
    /// Create the record for a publisher that has not shared yet.
    pub fn new(profile: &EntityProfile) -> Self {
        Self {
            entity_id: profile.entity_id.clone(),
            session_id: profile.session_id.clone(),
            display_name: profile.display_name.clone(),
            icon_id: profile.icon_id.clone(),
            color_id: profile.color_id.clone(),
            is_sharing: false,
            is_ghost: false,
            emergency_override: false,
            anchor: None,
            anchor_set_at: None,
            status: MovementStatus::Offline,
            last_position: None,
            accuracy_m: None,
            last_published_at: None,
            last_active_at: None,
            battery_level: None,
            charging: None,
        }
    }

    /// Status as seen by a viewer at `now`.
    ///
    /// A viewer derives OFFLINE when the entity stopped sharing or when no
    /// write has reached the store within `offline_timeout`; otherwise the
    /// published status is returned unchanged.
    pub fn derived_status(&self, now: DateTime<Utc>, offline_timeout: Duration) -> MovementStatus {
        if !self.is_sharing || self.is_stale(now, offline_timeout) {
            MovementStatus::Offline
        } else {
            self.status
        }
    }

    /// Check whether the last store write is older than `timeout`.
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        match self.last_published_at {
            None => true,
            Some(at) => elapsed_since(at, now) > timeout,
        }
    }

    /// Time since the last store write, or `None` if never written.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_published_at.map(|at| elapsed_since(at, now))
    }
}

/// Saturating elapsed time between two wall-clock timestamps.
///
/// Timestamps in the future (clock skew between devices) count as zero.
pub fn elapsed_since(earlier: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - earlier).to_std().unwrap_or(Duration::ZERO)
}

/// Immutable entry of an [`EventHistoryLog`](super::EventHistoryLog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: MovementStatus,
    pub occurred_at: DateTime<Utc>,
    pub position: Option<Coordinate>,
}

/// Kind of transition an alert can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    EnteredMoving,
    EnteredStationary,
    EnteredOffline,
}

impl TransitionKind {
    /// All kinds, in config file order.
    pub const ALL: [TransitionKind; 3] = [
        TransitionKind::EnteredMoving,
        TransitionKind::EnteredStationary,
        TransitionKind::EnteredOffline,
    ];

    /// The kind of transition that lands in `status`.
    pub fn entering(status: MovementStatus) -> Self {
        match status {
            MovementStatus::Moving => Self::EnteredMoving,
            MovementStatus::Stationary => Self::EnteredStationary,
            MovementStatus::Offline => Self::EnteredOffline,
        }
    }

    /// The status this kind of transition lands in.
    pub fn target(&self) -> MovementStatus {
        match self {
            Self::EnteredMoving => MovementStatus::Moving,
            Self::EnteredStationary => MovementStatus::Stationary,
            Self::EnteredOffline => MovementStatus::Offline,
        }
    }
}

/// A detected status change.
///
/// `from` is `None` for the first status an observer ever sees.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: Option<MovementStatus>,
    pub to: MovementStatus,
    pub at: DateTime<Utc>,
    pub position: Option<Coordinate>,
}

impl Transition {
    pub fn kind(&self) -> TransitionKind {
        TransitionKind::entering(self.to)
    }

    /// History entry for this transition.
    pub fn to_event(&self) -> StatusEvent {
        StatusEvent {
            status: self.to,
            occurred_at: self.at,
            position: self.position,
        }
    }
}
