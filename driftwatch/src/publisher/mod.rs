//! Publishing side: one task per tracked entity.
//!
//! [`EntityPublisher::start`] spawns the task and returns a
//! [`PublisherHandle`] used to drive manual positions and statuses, ghost
//! mode and the
//! emergency override, to read the local event history, and to stop
//! sharing.

mod engine;
mod error;
mod handle;

pub use engine::EntityPublisher;
pub use error::PublisherError;
pub use handle::{PublisherHandle, SensorSignal};
