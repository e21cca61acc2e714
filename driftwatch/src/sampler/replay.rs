//! Recorded track playback.
//!
//! A track file is JSON:
//!
//! ```json
//! {
//!   "name": "lagoon mooring",
//!   "points": [
//!     { "offset_secs": 0,  "lat": -22.2700, "lon": 166.4500, "accuracy_m": 5 },
//!     { "offset_secs": 10, "lat": -22.2702, "lon": 166.4502, "battery_level": 0.42 }
//!   ]
//! }
//! ```
//!
//! Offsets are seconds since the start of the replay. The [`ReplaySampler`]
//! emits each point at its offset on the tokio clock, stamped with the
//! corresponding wall time.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use super::{GeoSampler, SensorError, SensorEvent, SENSOR_CHANNEL_CAPACITY};
use crate::time::{to_chrono, Clock};
use crate::tracking::PositionSample;

/// Errors loading a track file.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("Failed to read track file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse track file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Track has no points")]
    Empty,

    #[error("Invalid track point {index}: {reason}")]
    InvalidPoint { index: usize, reason: String },
}

/// One recorded fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub offset_secs: f64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charging: Option<bool>,
}

impl TrackPoint {
    pub fn offset(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.offset_secs)
    }

    /// Build the sample this point represents for a replay started at `start`.
    pub fn to_sample(&self, start: DateTime<Utc>) -> PositionSample {
        let mut sample = PositionSample::new(self.lat, self.lon, start + to_chrono(self.offset()));
        sample.accuracy_m = self.accuracy_m;
        if let Some(level) = self.battery_level {
            sample = sample.with_battery(level, self.charging.unwrap_or(false));
        }
        sample
    }
}

/// A validated recorded track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayTrack {
    #[serde(default)]
    pub name: Option<String>,
    pub points: Vec<TrackPoint>,
}

impl ReplayTrack {
    /// Parse and validate a track from JSON text.
    pub fn from_json(text: &str) -> Result<Self, TrackError> {
        let track: ReplayTrack = serde_json::from_str(text)?;
        track.validate()?;
        Ok(track)
    }

    /// Load and validate a track file.
    pub fn load(path: &Path) -> Result<Self, TrackError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Offsets must be finite, non-negative and non-decreasing.
    ///
    /// Coordinates are not checked here: out-of-range fixes are replayed
    /// as-is and dropped by the classifier, like any invalid sensor reading.
    pub fn validate(&self) -> Result<(), TrackError> {
        if self.points.is_empty() {
            return Err(TrackError::Empty);
        }

        let mut previous = 0.0;
        for (index, point) in self.points.iter().enumerate() {
            if !point.offset_secs.is_finite() || point.offset_secs < 0.0 {
                return Err(TrackError::InvalidPoint {
                    index,
                    reason: format!("offset {} is not a non-negative number", point.offset_secs),
                });
            }
            if point.offset_secs < previous {
                return Err(TrackError::InvalidPoint {
                    index,
                    reason: format!(
                        "offset {} precedes previous offset {}",
                        point.offset_secs, previous
                    ),
                });
            }
            previous = point.offset_secs;
        }
        Ok(())
    }

    /// Offset of the last point.
    pub fn duration(&self) -> std::time::Duration {
        self.points
            .last()
            .map(TrackPoint::offset)
            .unwrap_or_default()
    }
}

/// Sampler that plays back a [`ReplayTrack`] in (tokio) real time.
///
/// The subscription closes after the last point.
#[derive(Debug, Clone)]
pub struct ReplaySampler {
    track: Arc<ReplayTrack>,
    clock: Clock,
}

impl ReplaySampler {
    pub fn new(track: ReplayTrack, clock: Clock) -> Self {
        Self {
            track: Arc::new(track),
            clock,
        }
    }

    pub fn track(&self) -> &ReplayTrack {
        &self.track
    }
}

impl GeoSampler for ReplaySampler {
    fn subscribe(&self) -> mpsc::Receiver<SensorEvent> {
        let (tx, rx) = mpsc::channel(SENSOR_CHANNEL_CAPACITY);
        let track = Arc::clone(&self.track);
        let clock = self.clock;

        tokio::spawn(async move {
            let start = clock.now();
            tracing::debug!(
                track = track.name.as_deref().unwrap_or("unnamed"),
                points = track.points.len(),
                "Replay started"
            );

            for point in &track.points {
                let sample = point.to_sample(start);
                let deadline = clock.instant_at(sample.captured_at);

                tokio::select! {
                    _ = tx.closed() => return,
                    _ = tokio::time::sleep_until(deadline) => {}
                }

                if tx.send(SensorEvent::Sample(sample)).await.is_err() {
                    return;
                }
            }

            tracing::debug!("Replay finished");
        });

        rx
    }

    async fn current_sample(&self) -> Result<PositionSample, SensorError> {
        self.track
            .points
            .first()
            .map(|point| point.to_sample(self.clock.now()))
            .ok_or_else(|| SensorError::Unavailable("empty track".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const TRACK: &str = r#"{
        "name": "lagoon",
        "points": [
            { "offset_secs": 0,  "lat": -22.2700, "lon": 166.4500, "accuracy_m": 5 },
            { "offset_secs": 10, "lat": -22.2702, "lon": 166.4502 },
            { "offset_secs": 25, "lat": -22.2700, "lon": 166.4501, "battery_level": 0.4 }
        ]
    }"#;

    #[test]
    fn test_parse_track() {
        let track = ReplayTrack::from_json(TRACK).unwrap();
        assert_eq!(track.name.as_deref(), Some("lagoon"));
        assert_eq!(track.points.len(), 3);
        assert_eq!(track.points[0].accuracy_m, Some(5.0));
        assert_eq!(track.duration(), Duration::from_secs(25));
    }

    #[test]
    fn test_rejects_empty_and_unordered_tracks() {
        assert!(matches!(
            ReplayTrack::from_json(r#"{"points": []}"#),
            Err(TrackError::Empty)
        ));

        let unordered = r#"{"points": [
            {"offset_secs": 10, "lat": 0, "lon": 0},
            {"offset_secs": 5, "lat": 0, "lon": 0}
        ]}"#;
        assert!(matches!(
            ReplayTrack::from_json(unordered),
            Err(TrackError::InvalidPoint { index: 1, .. })
        ));

        assert!(matches!(
            ReplayTrack::from_json("not json"),
            Err(TrackError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.json");
        std::fs::write(&path, TRACK).unwrap();

        assert_eq!(ReplayTrack::load(&path).unwrap().points.len(), 3);
        assert!(matches!(
            ReplayTrack::load(&dir.path().join("missing.json")),
            Err(TrackError::Io(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_emits_points_at_offsets() {
        let clock = Clock::new();
        let start = clock.now();
        let sampler = ReplaySampler::new(ReplayTrack::from_json(TRACK).unwrap(), clock);

        let seed = sampler.current_sample().await.unwrap();
        assert_eq!(seed.position.lat, -22.2700);

        let mut rx = sampler.subscribe();
        let mut stamps = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                SensorEvent::Sample(sample) => stamps.push(sample),
                SensorEvent::Error(e) => panic!("unexpected error {e}"),
            }
        }

        assert_eq!(stamps.len(), 3);
        assert_eq!(stamps[1].captured_at, start + chrono::Duration::seconds(10));
        assert_eq!(stamps[2].captured_at, start + chrono::Duration::seconds(25));
        assert_eq!(stamps[2].battery_level, Some(0.4));
        assert!(clock.now() >= start + chrono::Duration::seconds(25));
    }
}
