//! Update throttle - bounds routine store writes, never delays transitions.
//!
//! This is a monotonic skip-throttle, not a debounce: it never buffers a
//! delayed write. A routine refresh inside the window is simply dropped and
//! the store lags the sensor until the window has passed.
//!
//! ```text
//! transition ------------------------------> write now, restart window
//! routine, window elapsed (or first write) -> write now, restart window
//! routine, inside window ------------------> skip
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::state::elapsed_since;

/// Default minimum interval between routine writes (10 s).
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_secs(10);

/// What the throttle decided for one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Status transition or manual override: write unconditionally.
    Immediate,
    /// Routine refresh outside the window: write.
    Routine,
    /// Routine refresh inside the window: drop.
    Skip,
}

impl ThrottleDecision {
    pub fn should_write(&self) -> bool {
        !matches!(self, Self::Skip)
    }
}

/// Per-entity write-rate limiter.
#[derive(Debug, Clone)]
pub struct UpdateThrottle {
    interval: Duration,
    last_published_at: Option<DateTime<Utc>>,
}

impl Default for UpdateThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_INTERVAL)
    }
}

impl UpdateThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_published_at: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time of the last successful write.
    pub fn last_published_at(&self) -> Option<DateTime<Utc>> {
        self.last_published_at
    }

    /// Decide whether an update at `now` should be written.
    pub fn decide(&self, now: DateTime<Utc>, bypass: bool) -> ThrottleDecision {
        if bypass {
            return ThrottleDecision::Immediate;
        }

        match self.last_published_at {
            None => ThrottleDecision::Routine,
            Some(last) if elapsed_since(last, now) >= self.interval => ThrottleDecision::Routine,
            Some(_) => ThrottleDecision::Skip,
        }
    }

    /// Convenience wrapper over [`UpdateThrottle::decide`].
    pub fn should_publish(&self, now: DateTime<Utc>, is_transition: bool) -> bool {
        self.decide(now, is_transition).should_write()
    }

    /// Record a successful write, restarting the window.
    ///
    /// Failed writes must not be recorded so the next sample retries.
    pub fn record_publish(&mut self, now: DateTime<Utc>) {
        self.last_published_at = Some(now);
    }

    /// Forget the window (e.g. when sharing stops).
    pub fn reset(&mut self) {
        self.last_published_at = None;
    }
}
