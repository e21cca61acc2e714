//! Motion Classifier - anchor-based MOVING / STATIONARY detection.
//!
//! The classifier keeps an anchor point and measures every sample against
//! it, never against the previous sample, so a slow incremental drift cannot
//! escape detection.
//!
//! # State Machine
//!
//! ```text
//! (none|Offline) --[any sample]-------------------------------> Moving (re-anchor)
//! Moving  --[d > radius]--------------------------------------> Moving (re-anchor)
//! Moving  --[d <= radius, now - last_movement >= delay]-------> Stationary
//! Stationary --[d > radius]-----------------------------------> Moving (re-anchor)
//! ```
//!
//! A user can also force MOVING or STATIONARY through
//! [`MotionClassifier::force`]; both re-anchor at the current position.
//!
//! OFFLINE is never produced by classification. It is either derived from
//! staleness by viewers or declared by the publisher via
//! [`MotionClassifier::mark_offline`] after a long sensor outage.
//!
//! # Accuracy Gate
//!
//! A beyond-radius sample whose reported accuracy is worse than the gate is
//! not trusted on its own. MOVING is asserted only once
//! `low_accuracy_confirmations` such samples arrive back to back; any
//! within-radius sample resets the count.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::state::{elapsed_since, MovementStatus, PositionSample, Transition};
use crate::geo::{distance_meters, Coordinate};

/// Default immobility radius (20 m).
pub const DEFAULT_IMMOBILITY_RADIUS_M: f64 = 20.0;

/// Default time within the radius before STATIONARY (1 minute).
pub const DEFAULT_IMMOBILITY_DELAY: Duration = Duration::from_secs(60);

/// Default accuracy above which a drift reading needs confirmation.
pub const DEFAULT_ACCURACY_GATE_M: f64 = 20.0;

/// Default number of consecutive low-accuracy readings that confirm drift.
pub const DEFAULT_LOW_ACCURACY_CONFIRMATIONS: u32 = 3;

/// Configuration for the motion classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Distance from the anchor beyond which the entity is moving.
    pub immobility_radius_m: f64,

    /// Time spent within the radius before the entity is stationary.
    pub immobility_delay: Duration,

    /// Samples reporting worse accuracy need confirmation (`None` disables).
    pub accuracy_gate_m: Option<f64>,

    /// Consecutive gated samples required to assert MOVING.
    pub low_accuracy_confirmations: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            immobility_radius_m: DEFAULT_IMMOBILITY_RADIUS_M,
            immobility_delay: DEFAULT_IMMOBILITY_DELAY,
            accuracy_gate_m: Some(DEFAULT_ACCURACY_GATE_M),
            low_accuracy_confirmations: DEFAULT_LOW_ACCURACY_CONFIRMATIONS,
        }
    }
}

/// Outcome of classifying one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Status after this sample.
    pub status: MovementStatus,

    /// Set when the status changed.
    pub transition: Option<Transition>,

    /// Distance to the anchor in effect before this sample (`None` on the
    /// first sample).
    pub distance_m: Option<f64>,

    /// True when the anchor moved to this sample's position.
    pub anchor_reset: bool,
}

impl Classification {
    pub fn is_transition(&self) -> bool {
        self.transition.is_some()
    }
}

/// Per-entity movement state machine.
///
/// Not thread-safe by design: exactly one publisher task owns it.
#[derive(Debug)]
pub struct MotionClassifier {
    config: ClassifierConfig,
    status: Option<MovementStatus>,
    anchor: Option<Coordinate>,
    anchor_set_at: Option<DateTime<Utc>>,
    /// Last time the radius was exceeded (or the first sample arrived).
    last_movement_at: Option<DateTime<Utc>>,
    low_accuracy_streak: u32,
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl MotionClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            status: None,
            anchor: None,
            anchor_set_at: None,
            last_movement_at: None,
            low_accuracy_streak: 0,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Current status, `None` before the first sample.
    pub fn status(&self) -> Option<MovementStatus> {
        self.status
    }

    pub fn anchor(&self) -> Option<Coordinate> {
        self.anchor
    }

    pub fn anchor_set_at(&self) -> Option<DateTime<Utc>> {
        self.anchor_set_at
    }

    /// Classify one sample.
    ///
    /// Returns `None` for invalid samples (NaN or out-of-range coordinates),
    /// which are dropped without touching state.
    pub fn observe(&mut self, sample: &PositionSample) -> Option<Classification> {
        if !sample.is_valid() {
            tracing::trace!(
                lat = sample.position.lat,
                lon = sample.position.lon,
                "Dropping invalid sample"
            );
            return None;
        }

        let now = sample.captured_at;
        let position = sample.position;

        let anchor = match (self.status, self.anchor) {
            (Some(MovementStatus::Moving), Some(anchor))
            | (Some(MovementStatus::Stationary), Some(anchor)) => anchor,
            // First sample after (re)start, or first after an outage
            _ => {
                let from = self.status;
                self.reanchor(position, now);
                return Some(Classification {
                    status: MovementStatus::Moving,
                    transition: Some(Transition {
                        from,
                        to: MovementStatus::Moving,
                        at: now,
                        position: Some(position),
                    }),
                    distance_m: None,
                    anchor_reset: true,
                });
            }
        };

        let distance = distance_meters(&position, &anchor);
        let current = self.status.unwrap_or(MovementStatus::Moving);

        if distance > self.config.immobility_radius_m {
            if self.needs_confirmation(sample) {
                self.low_accuracy_streak += 1;
                if self.low_accuracy_streak < self.config.low_accuracy_confirmations {
                    tracing::debug!(
                        distance_m = format!("{:.1}", distance),
                        accuracy_m = ?sample.accuracy_m,
                        streak = self.low_accuracy_streak,
                        "Low-accuracy drift reading awaiting confirmation"
                    );
                    return Some(Classification {
                        status: current,
                        transition: None,
                        distance_m: Some(distance),
                        anchor_reset: false,
                    });
                }
            }

            self.reanchor(position, now);
            let transition = (current != MovementStatus::Moving).then(|| Transition {
                from: Some(current),
                to: MovementStatus::Moving,
                at: now,
                position: Some(position),
            });

            return Some(Classification {
                status: MovementStatus::Moving,
                transition,
                distance_m: Some(distance),
                anchor_reset: true,
            });
        }

        self.low_accuracy_streak = 0;

        if current == MovementStatus::Moving {
            let idle = self
                .last_movement_at
                .map(|at| elapsed_since(at, now))
                .unwrap_or(Duration::ZERO);

            if idle >= self.config.immobility_delay {
                self.status = Some(MovementStatus::Stationary);
                return Some(Classification {
                    status: MovementStatus::Stationary,
                    transition: Some(Transition {
                        from: Some(MovementStatus::Moving),
                        to: MovementStatus::Stationary,
                        at: now,
                        position: Some(position),
                    }),
                    distance_m: Some(distance),
                    anchor_reset: false,
                });
            }
        }

        Some(Classification {
            status: current,
            transition: None,
            distance_m: Some(distance),
            anchor_reset: false,
        })
    }

    /// Declare the entity offline after a sensor outage.
    ///
    /// Returns the transition if the status changed. The next sample is
    /// handled as a restart.
    pub fn mark_offline(
        &mut self,
        at: DateTime<Utc>,
        position: Option<Coordinate>,
    ) -> Option<Transition> {
        match self.status {
            Some(MovementStatus::Offline) | None => None,
            Some(from) => {
                self.status = Some(MovementStatus::Offline);
                self.low_accuracy_streak = 0;
                Some(Transition {
                    from: Some(from),
                    to: MovementStatus::Offline,
                    at,
                    position,
                })
            }
        }
    }

    /// Apply a manual MOVING or STATIONARY override at `position`.
    ///
    /// Re-anchors at `position` and restarts the immobility delay, so a
    /// forced STATIONARY ("drop anchor") holds until the entity drifts out
    /// of the radius, and a forced MOVING needs a full delay before it can
    /// settle again. Returns the transition if the status changed, or
    /// `None` for OFFLINE, which cannot be forced.
    pub fn force(
        &mut self,
        status: MovementStatus,
        position: Coordinate,
        at: DateTime<Utc>,
    ) -> Option<Transition> {
        if status == MovementStatus::Offline {
            return None;
        }

        let from = self.status;
        self.reanchor(position, at);
        self.status = Some(status);

        (from != Some(status)).then(|| Transition {
            from,
            to: status,
            at,
            position: Some(position),
        })
    }

    /// Forget everything; the next sample re-anchors and reports MOVING.
    pub fn reset(&mut self) {
        self.status = None;
        self.anchor = None;
        self.anchor_set_at = None;
        self.last_movement_at = None;
        self.low_accuracy_streak = 0;
    }

    fn reanchor(&mut self, position: Coordinate, now: DateTime<Utc>) {
        self.status = Some(MovementStatus::Moving);
        self.anchor = Some(position);
        self.anchor_set_at = Some(now);
        self.last_movement_at = Some(now);
        self.low_accuracy_streak = 0;
    }

    fn needs_confirmation(&self, sample: &PositionSample) -> bool {
        match (self.config.accuracy_gate_m, sample.accuracy_m) {
            (Some(gate), Some(accuracy)) => {
                accuracy > gate && self.config.low_accuracy_confirmations > 1
            }
            _ => false,
        }
    }
}
