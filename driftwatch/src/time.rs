//! Wall-clock helpers.
//!
//! Tasks stamp records with [`Clock::now`], which advances with the tokio
//! clock instead of the system clock. Under a paused test runtime the wall
//! time therefore moves exactly as far as `tokio::time` does.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Wall clock pinned to a tokio `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    wall: DateTime<Utc>,
    instant: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Start at the current system time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Start at an arbitrary wall time (used by replays and tests).
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            wall,
            instant: Instant::now(),
        }
    }

    /// Current wall time.
    pub fn now(&self) -> DateTime<Utc> {
        self.wall + to_chrono(self.instant.elapsed())
    }

    /// The tokio instant at which this clock reads `at`.
    ///
    /// Times before the clock started map to its start instant.
    pub fn instant_at(&self, at: DateTime<Utc>) -> Instant {
        let offset = (at - self.wall).to_std().unwrap_or(Duration::ZERO);
        self.instant + offset
    }
}

/// Convert a std duration to chrono, saturating at zero on overflow.
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}
