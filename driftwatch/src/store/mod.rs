//! Shared position store - the real-time document store entities publish to.
//!
//! The store holds the latest [`TrackedEntityState`] per entity and pushes
//! changes to subscribers. The engine assumes no transactional semantics:
//! every write is a complete, idempotent record and the last write wins.
//!
//! - [`SharedPositionStore`] - adapter trait (upsert + subscriptions)
//! - [`MemoryPositionStore`] - in-process implementation backed by `watch` channels

mod error;
mod memory;

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::watch;

use crate::tracking::TrackedEntityState;

pub use error::StoreError;
pub use memory::MemoryPositionStore;

/// Latest record of every entity in a session, keyed by entity id.
pub type SessionSnapshot = HashMap<String, TrackedEntityState>;

/// Adapter over the real-time document store.
///
/// Subscriptions are latest-value channels: a slow subscriber sees the most
/// recent record, never a backlog.
pub trait SharedPositionStore: Send + Sync {
    /// Write the full record for `state.entity_id` (last write wins).
    fn upsert(
        &self,
        state: &TrackedEntityState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Subscribe to one entity's record (`None` until first written).
    fn subscribe_entity(&self, entity_id: &str) -> watch::Receiver<Option<TrackedEntityState>>;

    /// Subscribe to every entity publishing into `session_id`.
    fn subscribe_session(&self, session_id: &str) -> watch::Receiver<SessionSnapshot>;
}
