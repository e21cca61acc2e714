//! In-process shared position store.
//!
//! Backs each entity and each session with a `watch` channel so subscribers
//! always observe the latest record. Every accepted write is also appended to
//! a write log, which the CLI replay and the tests use to inspect exactly
//! what reached the store.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{SessionSnapshot, SharedPositionStore, StoreError};
use crate::tracking::TrackedEntityState;

/// In-memory [`SharedPositionStore`].
#[derive(Default)]
pub struct MemoryPositionStore {
    entities: DashMap<String, watch::Sender<Option<TrackedEntityState>>>,
    sessions: DashMap<String, watch::Sender<SessionSnapshot>>,
    write_log: Mutex<Vec<TrackedEntityState>>,
    /// Number of upcoming writes to reject (failure injection).
    fail_next: AtomicUsize,
}

impl std::fmt::Debug for MemoryPositionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPositionStore")
            .field("entities", &self.entities.len())
            .field("sessions", &self.sessions.len())
            .field("writes", &self.write_log.lock().len())
            .finish_non_exhaustive()
    }
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` writes with [`StoreError::WriteFailed`].
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Latest record for an entity.
    pub fn get(&self, entity_id: &str) -> Option<TrackedEntityState> {
        self.entities
            .get(entity_id)
            .and_then(|sender| sender.borrow().clone())
    }

    /// Every accepted write, oldest first.
    pub fn writes(&self) -> Vec<TrackedEntityState> {
        self.write_log.lock().clone()
    }

    /// Accepted writes for one entity, oldest first.
    pub fn writes_for(&self, entity_id: &str) -> Vec<TrackedEntityState> {
        self.write_log
            .lock()
            .iter()
            .filter(|s| s.entity_id == entity_id)
            .cloned()
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.write_log.lock().len()
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn apply(&self, state: &TrackedEntityState) {
        let previous_session = {
            let sender = self
                .entities
                .entry(state.entity_id.clone())
                .or_insert_with(|| watch::channel(None).0);
            let previous = sender.send_replace(Some(state.clone()));
            previous.and_then(|p| p.session_id)
        };

        // An entity that switched sessions leaves the old snapshot
        if let Some(old) = previous_session.filter(|old| Some(old) != state.session_id.as_ref()) {
            if let Some(sender) = self.sessions.get(&old) {
                sender.send_modify(|snapshot| {
                    snapshot.remove(&state.entity_id);
                });
            }
        }

        if let Some(session_id) = &state.session_id {
            let sender = self
                .sessions
                .entry(session_id.clone())
                .or_insert_with(|| watch::channel(SessionSnapshot::new()).0);
            sender.send_modify(|snapshot| {
                snapshot.insert(state.entity_id.clone(), state.clone());
            });
        }

        self.write_log.lock().push(state.clone());
    }
}

impl SharedPositionStore for MemoryPositionStore {
    async fn upsert(&self, state: &TrackedEntityState) -> Result<(), StoreError> {
        if self.take_injected_failure() {
            tracing::trace!(entity = %state.entity_id, "Injected store write failure");
            return Err(StoreError::WriteFailed("injected failure".to_string()));
        }

        self.apply(state);
        Ok(())
    }

    fn subscribe_entity(&self, entity_id: &str) -> watch::Receiver<Option<TrackedEntityState>> {
        self.entities
            .entry(entity_id.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    fn subscribe_session(&self, session_id: &str) -> watch::Receiver<SessionSnapshot> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| watch::channel(SessionSnapshot::new()).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{EntityProfile, MovementStatus};

    fn record(id: &str, session: &str, status: MovementStatus) -> TrackedEntityState {
        let mut state = TrackedEntityState::new(&EntityProfile::new(id).in_session(session));
        state.is_sharing = true;
        state.status = status;
        state
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = MemoryPositionStore::new();
        assert!(store.get("A").is_none());

        store
            .upsert(&record("A", "S", MovementStatus::Moving))
            .await
            .unwrap();

        assert_eq!(store.get("A").unwrap().status, MovementStatus::Moving);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = MemoryPositionStore::new();
        store
            .upsert(&record("A", "S", MovementStatus::Moving))
            .await
            .unwrap();
        store
            .upsert(&record("A", "S", MovementStatus::Stationary))
            .await
            .unwrap();

        assert_eq!(store.get("A").unwrap().status, MovementStatus::Stationary);
        assert_eq!(store.writes_for("A").len(), 2);
    }

    #[tokio::test]
    async fn test_entity_subscription_sees_latest() {
        let store = MemoryPositionStore::new();
        let mut rx = store.subscribe_entity("A");
        assert!(rx.borrow().is_none());

        store
            .upsert(&record("A", "S", MovementStatus::Moving))
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().as_ref().unwrap().status,
            MovementStatus::Moving
        );
    }

    #[tokio::test]
    async fn test_session_subscription_groups_entities() {
        let store = MemoryPositionStore::new();
        let rx = store.subscribe_session("S");

        store
            .upsert(&record("A", "S", MovementStatus::Moving))
            .await
            .unwrap();
        store
            .upsert(&record("B", "S", MovementStatus::Stationary))
            .await
            .unwrap();
        store
            .upsert(&record("C", "OTHER", MovementStatus::Moving))
            .await
            .unwrap();

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains_key("A"));
        assert!(snapshot.contains_key("B"));
    }

    #[tokio::test]
    async fn test_session_switch_removes_from_old_session() {
        let store = MemoryPositionStore::new();
        let old = store.subscribe_session("S1");
        let new = store.subscribe_session("S2");

        store
            .upsert(&record("A", "S1", MovementStatus::Moving))
            .await
            .unwrap();
        store
            .upsert(&record("A", "S2", MovementStatus::Moving))
            .await
            .unwrap();

        assert!(old.borrow().is_empty());
        assert!(new.borrow().contains_key("A"));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryPositionStore::new();
        store.fail_next_writes(2);

        let state = record("A", "S", MovementStatus::Moving);
        assert!(matches!(
            store.upsert(&state).await,
            Err(StoreError::WriteFailed(_))
        ));
        assert!(store.upsert(&state).await.is_err());
        assert!(store.upsert(&state).await.is_ok());
        assert_eq!(store.write_count(), 1);
    }
}
