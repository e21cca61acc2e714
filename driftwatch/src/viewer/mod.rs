//! Viewing side: read-only projections of tracked entities.
//!
//! - [`ViewerTracker`] - pure projection (derived OFFLINE, transitions, histories)
//! - [`spawn_session_viewer`] - async loop over a store session subscription

mod session;
mod tracker;

pub use session::{
    spawn_session_viewer, SessionView, ViewerConfig, ViewerHandle, DEFAULT_RECHECK_INTERVAL,
};
pub use tracker::{EntityView, TrackedView, ViewerTracker, ViewerUpdate};
