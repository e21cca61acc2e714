//! Error types for the entity publisher.

use thiserror::Error;

use crate::store::StoreError;
use crate::tracking::MovementStatus;

/// Errors returned through a [`PublisherHandle`](super::PublisherHandle).
#[derive(Debug, Clone, Error)]
pub enum PublisherError {
    /// The publisher task has already shut down.
    #[error("Publisher already stopped")]
    AlreadyStopped,

    /// A manual status needs a known position to anchor at.
    #[error("No position fix yet")]
    NoFix,

    /// Only MOVING and STATIONARY can be set by hand.
    #[error("Status {0} cannot be set manually")]
    UnsupportedManualStatus(MovementStatus),

    /// A store write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
