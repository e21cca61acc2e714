//! Movement tracking core.
//!
//! Pure, synchronous building blocks shared by the publisher and viewer
//! tasks. Nothing in here touches the store, the sensor, or the clock; every
//! operation takes its timestamp from the sample or the caller.
//!
//! # Components
//!
//! - [`state`] - `TrackedEntityState`, `PositionSample`, `MovementStatus`, `StatusEvent`
//! - [`classifier`] - `MotionClassifier`, the anchor-based state machine
//! - [`throttle`] - `UpdateThrottle`, the routine-write rate limiter
//! - [`history`] - `EventHistoryLog`, the bounded newest-first ring buffer
//! - [`visibility`] - `VisibilityGate`, ghost mode and emergency override
//! - [`config`] - `TrackingConfig` with engine-wide defaults

mod classifier;
mod config;
mod history;
mod state;
mod throttle;
mod visibility;

pub use classifier::{
    Classification, ClassifierConfig, MotionClassifier, DEFAULT_ACCURACY_GATE_M,
    DEFAULT_IMMOBILITY_DELAY, DEFAULT_IMMOBILITY_RADIUS_M, DEFAULT_LOW_ACCURACY_CONFIRMATIONS,
};
pub use config::{
    TrackingConfig, DEFAULT_FALLBACK_INTERVAL, DEFAULT_OFFLINE_TIMEOUT, DEFAULT_WRITE_TIMEOUT,
};
pub use history::{EventHistoryLog, DEFAULT_EVENT_LOG_CAPACITY};
pub use state::{
    elapsed_since, EntityProfile, MovementStatus, PositionSample, SampleOrigin, StatusEvent,
    TrackedEntityState, Transition, TransitionKind,
};
pub use throttle::{ThrottleDecision, UpdateThrottle, DEFAULT_THROTTLE_INTERVAL};
pub use visibility::{ViewerRole, VisibilityGate, VisibilityMode};
