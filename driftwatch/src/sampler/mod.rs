//! Positioning sensor abstraction.
//!
//! A [`GeoSampler`] yields a cancellable stream of [`SensorEvent`]s plus a
//! one-shot fix used to seed the anchor when sharing starts. Dropping the
//! receiver returned by [`GeoSampler::subscribe`] cancels the subscription.
//!
//! Implementations:
//!
//! - [`ChannelSampler`] - push-based, fed through a [`SensorFeed`]
//! - [`IntervalSampler`] - polls a [`PositionSource`] on a fixed interval
//! - [`ReplaySampler`] - plays back a recorded [`ReplayTrack`]

mod channel;
mod interval;
mod replay;

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::tracking::PositionSample;

pub use channel::{ChannelSampler, SensorFeed};
pub use interval::{IntervalSampler, PositionSource};
pub use replay::{ReplaySampler, ReplayTrack, TrackError, TrackPoint};

/// Buffer size of a sensor subscription.
pub const SENSOR_CHANNEL_CAPACITY: usize = 256;

/// Errors reported by the positioning sensor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The user refused location access.
    #[error("Location permission denied")]
    PermissionDenied,

    /// No positioning hardware, or the provider failed.
    #[error("Location unavailable: {0}")]
    Unavailable(String),

    /// No fix was obtained in time.
    #[error("Timed out waiting for a position fix")]
    Timeout,
}

/// One item of a sensor subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Sample(PositionSample),
    Error(SensorError),
}

/// Device positioning sensor.
pub trait GeoSampler: Send + Sync {
    /// Start a subscription. Samples stop when the receiver is dropped.
    fn subscribe(&self) -> mpsc::Receiver<SensorEvent>;

    /// Obtain a single fix right now.
    fn current_sample(&self) -> impl Future<Output = Result<PositionSample, SensorError>> + Send;
}
