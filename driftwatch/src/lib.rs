//! driftwatch - real-time position tracking and movement classification.
//!
//! Tracked entities (vessels, participants) publish their position to a
//! shared real-time store; viewers subscribe and are alerted when an entity
//! starts moving, comes to rest, or goes silent.
//!
//! # Data flow
//!
//! ```text
//! GeoSampler → MotionClassifier → UpdateThrottle → SharedPositionStore
//!                    │                                    │
//!                    └→ EventHistoryLog          viewer subscription
//!                                                         │
//!                                     ViewerTracker → AlertDispatcher
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use driftwatch::publisher::EntityPublisher;
//! use driftwatch::sampler::ChannelSampler;
//! use driftwatch::store::MemoryPositionStore;
//! use driftwatch::tracking::{EntityProfile, TrackingConfig};
//!
//! let store = Arc::new(MemoryPositionStore::new());
//! let (sampler, feed) = ChannelSampler::new();
//! let profile = EntityProfile::new("boat-1").in_session("lagoon");
//! let handle = EntityPublisher::new(profile, TrackingConfig::default(), sampler, store).start();
//! ```

pub mod alert;
pub mod config;
pub mod geo;
pub mod logging;
pub mod publisher;
pub mod sampler;
pub mod store;
pub mod time;
pub mod tracking;
pub mod viewer;

/// Version of the driftwatch library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
