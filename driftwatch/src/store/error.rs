//! Error types for shared position store adapters.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when writing to the shared position store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store rejected or lost the write (network failure, quota, ...).
    #[error("Store write failed: {0}")]
    WriteFailed(String),

    /// The write did not complete within the configured timeout.
    #[error("Store write timed out after {0:?}")]
    Timeout(Duration),

    /// The store connection has been shut down.
    #[error("Store closed")]
    Closed,
}
