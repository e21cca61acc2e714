//! Visibility Gate - ghost mode and emergency override.
//!
//! The gate never blocks persistence: a ghosted entity keeps writing its full
//! record to the store, and the privileged viewer keeps seeing it. Only the
//! group projection built by [`VisibilityGate::project_session`] filters it out.
//!
//! The emergency override is sticky. Once raised it stays set, regardless of
//! ghost toggles, until explicitly cleared, so a ghosted publisher cannot
//! silently drop back to hidden in the middle of an emergency.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::state::TrackedEntityState;

/// How a viewer relates to the entities it watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewerRole {
    /// Ordinary group member.
    Group,
    /// Designated viewer who sees ghosted entities (e.g. session organizer).
    Privileged,
}

/// Effective visibility of a publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMode {
    /// Visible to every authorized viewer.
    Normal,
    /// Visible to the privileged viewer only.
    Ghost,
    /// Visible to everyone, whatever the ghost flag says.
    EmergencyOverride,
}

/// Publisher-side gate state, stamped onto every outgoing record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityGate {
    ghost: bool,
    emergency: bool,
}

impl VisibilityGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> VisibilityMode {
        if self.emergency {
            VisibilityMode::EmergencyOverride
        } else if self.ghost {
            VisibilityMode::Ghost
        } else {
            VisibilityMode::Normal
        }
    }

    pub fn is_ghost(&self) -> bool {
        self.ghost
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    /// Toggle ghost mode. Does not affect an active emergency override.
    pub fn set_ghost(&mut self, ghost: bool) {
        self.ghost = ghost;
    }

    /// Raise the emergency override. Returns true if it was not already set.
    pub fn raise_emergency(&mut self) -> bool {
        !std::mem::replace(&mut self.emergency, true)
    }

    /// Clear the emergency override. Returns true if it was set.
    pub fn clear_emergency(&mut self) -> bool {
        std::mem::replace(&mut self.emergency, false)
    }

    /// Copy the gate flags onto an outgoing record.
    pub fn stamp(&self, state: &mut TrackedEntityState) {
        state.is_ghost = self.ghost;
        state.emergency_override = self.emergency;
    }

    /// Decide whether `state` is broadcast to a viewer with `role`.
    pub fn should_broadcast(state: &TrackedEntityState, role: ViewerRole) -> bool {
        match role {
            ViewerRole::Privileged => true,
            ViewerRole::Group => state.emergency_override || !state.is_ghost,
        }
    }

    /// Group-view projection of a session snapshot for a viewer with `role`.
    pub fn project_session(
        snapshot: &HashMap<String, TrackedEntityState>,
        role: ViewerRole,
    ) -> HashMap<String, TrackedEntityState> {
        snapshot
            .iter()
            .filter(|(_, state)| Self::should_broadcast(state, role))
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::EntityProfile;

    fn record(id: &str, gate: VisibilityGate) -> TrackedEntityState {
        let mut state = TrackedEntityState::new(&EntityProfile::new(id));
        state.is_sharing = true;
        gate.stamp(&mut state);
        state
    }

    #[test]
    fn test_normal_is_visible_to_all() {
        let state = record("A", VisibilityGate::new());
        assert!(VisibilityGate::should_broadcast(&state, ViewerRole::Group));
        assert!(VisibilityGate::should_broadcast(&state, ViewerRole::Privileged));
    }

    #[test]
    fn test_ghost_hidden_from_group_only() {
        let mut gate = VisibilityGate::new();
        gate.set_ghost(true);
        assert_eq!(gate.mode(), VisibilityMode::Ghost);

        let state = record("A", gate);
        assert!(!VisibilityGate::should_broadcast(&state, ViewerRole::Group));
        assert!(VisibilityGate::should_broadcast(&state, ViewerRole::Privileged));
    }

    #[test]
    fn test_emergency_overrides_ghost() {
        let mut gate = VisibilityGate::new();
        gate.set_ghost(true);
        assert!(gate.raise_emergency());
        assert_eq!(gate.mode(), VisibilityMode::EmergencyOverride);

        let state = record("A", gate);
        assert!(VisibilityGate::should_broadcast(&state, ViewerRole::Group));
    }

    #[test]
    fn test_emergency_is_sticky_across_ghost_toggles() {
        let mut gate = VisibilityGate::new();
        gate.raise_emergency();
        gate.set_ghost(true);
        gate.set_ghost(false);
        gate.set_ghost(true);
        assert_eq!(gate.mode(), VisibilityMode::EmergencyOverride);
        assert!(!gate.raise_emergency(), "second raise is a no-op");

        assert!(gate.clear_emergency());
        assert_eq!(gate.mode(), VisibilityMode::Ghost);
        assert!(!gate.clear_emergency());
    }

    #[test]
    fn test_project_session() {
        let mut ghost = VisibilityGate::new();
        ghost.set_ghost(true);

        let snapshot: HashMap<String, TrackedEntityState> = [
            ("A".to_string(), record("A", VisibilityGate::new())),
            ("B".to_string(), record("B", ghost)),
        ]
        .into_iter()
        .collect();

        let group = VisibilityGate::project_session(&snapshot, ViewerRole::Group);
        assert_eq!(group.len(), 1);
        assert!(group.contains_key("A"));

        let privileged = VisibilityGate::project_session(&snapshot, ViewerRole::Privileged);
        assert_eq!(privileged.len(), 2);
    }
}
