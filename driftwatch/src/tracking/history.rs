//! Bounded, newest-first log of status changes.
//!
//! Each observer keeps its own partial history from the moment it started
//! watching an entity. This is a fixed-size ring buffer for timeline display,
//! not a durable audit trail.

use std::collections::VecDeque;

use super::state::StatusEvent;

/// Default number of events kept per entity.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 10;

/// Fixed-capacity ring buffer of [`StatusEvent`]s, newest first.
#[derive(Debug, Clone)]
pub struct EventHistoryLog {
    capacity: usize,
    // Front is newest
    events: VecDeque<StatusEvent>,
}

impl Default for EventHistoryLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

impl EventHistoryLog {
    /// Create a log holding at most `capacity` events (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, evicting the oldest when full.
    pub fn append(&mut self, event: StatusEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_back();
        }
        self.events.push_front(event);
    }

    /// Read-only snapshot, most recent first.
    pub fn entries(&self) -> Vec<StatusEvent> {
        self.events.iter().cloned().collect()
    }

    /// Most recent event.
    pub fn latest(&self) -> Option<&StatusEvent> {
        self.events.front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::MovementStatus;
    use chrono::{TimeZone, Utc};

    fn event(secs: i64, status: MovementStatus) -> StatusEvent {
        StatusEvent {
            status,
            occurred_at: Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap()
                + chrono::Duration::seconds(secs),
            position: None,
        }
    }

    fn alternating(i: i64) -> MovementStatus {
        if i % 2 == 0 {
            MovementStatus::Moving
        } else {
            MovementStatus::Stationary
        }
    }

    #[test]
    fn test_empty_log() {
        let log = EventHistoryLog::default();
        assert!(log.is_empty());
        assert!(log.latest().is_none());
        assert_eq!(log.capacity(), DEFAULT_EVENT_LOG_CAPACITY);
    }

    #[test]
    fn test_newest_first() {
        let mut log = EventHistoryLog::default();
        log.append(event(0, MovementStatus::Moving));
        log.append(event(60, MovementStatus::Stationary));

        let entries = log.entries();
        assert_eq!(entries[0].status, MovementStatus::Stationary);
        assert_eq!(entries[1].status, MovementStatus::Moving);
        assert_eq!(log.latest().unwrap().status, MovementStatus::Stationary);
    }

    #[test]
    fn test_never_exceeds_capacity_and_evicts_oldest() {
        let mut log = EventHistoryLog::with_capacity(10);

        for i in 0..25 {
            log.append(event(i, alternating(i)));
            assert!(log.len() <= 10);
        }

        let entries = log.entries();
        assert_eq!(entries.len(), 10);
        // Most recent 10 of 0..25, newest first
        let secs: Vec<i64> = entries
            .iter()
            .map(|e| {
                (e.occurred_at - Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap()).num_seconds()
            })
            .collect();
        assert_eq!(secs, (15..25).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut log = EventHistoryLog::default();
        log.append(event(0, MovementStatus::Moving));
        let snapshot = log.entries();

        log.append(event(1, MovementStatus::Stationary));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut log = EventHistoryLog::with_capacity(0);
        log.append(event(0, MovementStatus::Moving));
        log.append(event(1, MovementStatus::Offline));
        assert_eq!(log.len(), 1);
        assert_eq!(log.latest().unwrap().status, MovementStatus::Offline);
    }
}
