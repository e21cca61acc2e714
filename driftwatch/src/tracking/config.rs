//! Engine-wide tracking configuration.

use std::time::Duration;

use super::classifier::ClassifierConfig;
use super::history::DEFAULT_EVENT_LOG_CAPACITY;
use super::throttle::DEFAULT_THROTTLE_INTERVAL;

/// Default staleness timeout after which an entity is OFFLINE (90 s).
///
/// Three times the fallback sampling interval, so a single missed poll
/// never flips an entity offline.
pub const DEFAULT_OFFLINE_TIMEOUT: Duration = Duration::from_secs(90);

/// Default polling interval when push updates are unavailable (30 s).
pub const DEFAULT_FALLBACK_INTERVAL: Duration = Duration::from_secs(30);

/// Default timeout for a single store write (5 s).
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration shared by publishers and viewers.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    pub classifier: ClassifierConfig,

    /// Minimum interval between routine store writes.
    pub throttle_interval: Duration,

    /// No fresh update within this window means OFFLINE.
    pub offline_timeout: Duration,

    /// Polling interval of the fallback sampler.
    pub fallback_interval: Duration,

    /// Events kept per entity in the history log.
    pub event_log_capacity: usize,

    /// Upper bound on a single store write.
    pub write_timeout: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            throttle_interval: DEFAULT_THROTTLE_INTERVAL,
            offline_timeout: DEFAULT_OFFLINE_TIMEOUT,
            fallback_interval: DEFAULT_FALLBACK_INTERVAL,
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl TrackingConfig {
    /// Check cross-field constraints.
    ///
    /// Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        let radius = self.classifier.immobility_radius_m;
        if !radius.is_finite() || radius <= 0.0 {
            return Err("immobility radius must be positive".to_string());
        }
        if self.offline_timeout <= self.fallback_interval {
            return Err(format!(
                "offline timeout ({}s) must exceed the fallback sampling interval ({}s)",
                self.offline_timeout.as_secs(),
                self.fallback_interval.as_secs()
            ));
        }
        if self.event_log_capacity == 0 {
            return Err("event log capacity must be at least 1".to_string());
        }
        Ok(())
    }
}
