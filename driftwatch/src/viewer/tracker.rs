//! Pure viewer-side projection of a session.
//!
//! The tracker never mutates remote state. It turns successive store
//! snapshots (and the passage of time) into derived statuses, transitions
//! in detection order, and one bounded history per visible entity.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::SessionSnapshot;
use crate::tracking::{
    EventHistoryLog, MovementStatus, StatusEvent, TrackedEntityState, Transition, ViewerRole,
    VisibilityGate,
};

/// Something the viewer should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerUpdate {
    /// Derived status changed (or the entity was seen for the first time).
    Transition {
        entity_id: String,
        transition: Transition,
    },
    /// The entity raised its emergency override since the last snapshot,
    /// or was first seen with it already raised.
    EmergencyRaised {
        entity_id: String,
        at: DateTime<Utc>,
    },
    /// The entity is no longer visible to this viewer.
    Left { entity_id: String },
}

/// What a viewer knows about one entity.
#[derive(Debug, Clone)]
pub struct TrackedView {
    /// Last record received from the store.
    pub state: TrackedEntityState,
    /// Status derived at the last observation or re-check.
    pub status: MovementStatus,
    pub history: EventHistoryLog,
}

/// Read-only snapshot handed to rendering surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    pub state: TrackedEntityState,
    pub status: MovementStatus,
    /// Newest first.
    pub history: Vec<StatusEvent>,
}

impl From<&TrackedView> for EntityView {
    fn from(view: &TrackedView) -> Self {
        Self {
            state: view.state.clone(),
            status: view.status,
            history: view.history.entries(),
        }
    }
}

/// Viewer-side state for one session.
#[derive(Debug)]
pub struct ViewerTracker {
    role: ViewerRole,
    offline_timeout: Duration,
    event_log_capacity: usize,
    entities: HashMap<String, TrackedView>,
}

impl ViewerTracker {
    pub fn new(role: ViewerRole, offline_timeout: Duration, event_log_capacity: usize) -> Self {
        Self {
            role,
            offline_timeout,
            event_log_capacity,
            entities: HashMap::new(),
        }
    }

    pub fn role(&self) -> ViewerRole {
        self.role
    }

    /// Apply a store snapshot observed at `now`.
    pub fn observe(&mut self, snapshot: &SessionSnapshot, now: DateTime<Utc>) -> Vec<ViewerUpdate> {
        let visible = VisibilityGate::project_session(snapshot, self.role);
        let mut updates = Vec::new();

        let mut gone: Vec<String> = self
            .entities
            .keys()
            .filter(|id| !visible.contains_key(*id))
            .cloned()
            .collect();
        gone.sort();
        for entity_id in gone {
            self.entities.remove(&entity_id);
            tracing::debug!(entity = %entity_id, "Entity left view");
            updates.push(ViewerUpdate::Left { entity_id });
        }

        let capacity = self.event_log_capacity;
        let mut ids: Vec<&String> = visible.keys().collect();
        ids.sort();
        for id in ids {
            let state = &visible[id];
            let derived = state.derived_status(now, self.offline_timeout);
            let previous = self.entities.get(id).map(|view| view.status);
            let had_emergency = self
                .entities
                .get(id)
                .is_some_and(|view| view.state.emergency_override);

            let view = self.entities.entry(id.clone()).or_insert_with(|| TrackedView {
                state: state.clone(),
                status: derived,
                history: EventHistoryLog::with_capacity(capacity),
            });
            view.state = state.clone();

            if previous != Some(derived) {
                let transition = Transition {
                    from: previous,
                    to: derived,
                    at: transition_time(state, derived, now),
                    position: state.last_position,
                };
                view.status = derived;
                view.history.append(transition.to_event());
                updates.push(ViewerUpdate::Transition {
                    entity_id: id.clone(),
                    transition,
                });
            }

            if state.emergency_override && !had_emergency {
                tracing::warn!(entity = %id, "Emergency override seen");
                updates.push(ViewerUpdate::EmergencyRaised {
                    entity_id: id.clone(),
                    at: state.last_published_at.unwrap_or(now),
                });
            }
        }

        updates
    }

    /// Re-derive staleness without a new snapshot.
    pub fn recheck(&mut self, now: DateTime<Utc>) -> Vec<ViewerUpdate> {
        let mut updates = Vec::new();
        let mut ids: Vec<String> = self.entities.keys().cloned().collect();
        ids.sort();

        for id in ids {
            let Some(view) = self.entities.get_mut(&id) else {
                continue;
            };
            let derived = view.state.derived_status(now, self.offline_timeout);
            if derived == view.status {
                continue;
            }

            tracing::debug!(
                entity = %id,
                age_secs = ?view.state.age(now).map(|age| age.as_secs()),
                "Entity went stale"
            );
            let transition = Transition {
                from: Some(view.status),
                to: derived,
                at: now,
                position: view.state.last_position,
            };
            view.status = derived;
            view.history.append(transition.to_event());
            updates.push(ViewerUpdate::Transition {
                entity_id: id,
                transition,
            });
        }

        updates
    }

    pub fn get(&self, entity_id: &str) -> Option<&TrackedView> {
        self.entities.get(entity_id)
    }

    pub fn status(&self, entity_id: &str) -> Option<MovementStatus> {
        self.entities.get(entity_id).map(|view| view.status)
    }

    pub fn history(&self, entity_id: &str) -> Vec<StatusEvent> {
        self.entities
            .get(entity_id)
            .map(|view| view.history.entries())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Snapshot for rendering.
    pub fn views(&self) -> HashMap<String, EntityView> {
        self.entities
            .iter()
            .map(|(id, view)| (id.clone(), EntityView::from(view)))
            .collect()
    }
}

/// Staleness is detected now; published statuses happened at their write.
fn transition_time(
    state: &TrackedEntityState,
    derived: MovementStatus,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    if derived == MovementStatus::Offline && state.is_sharing {
        now
    } else {
        state.last_published_at.unwrap_or(now)
    }
}
