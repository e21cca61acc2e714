//! Control handle for a running publisher task.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::PublisherError;
use crate::store::StoreError;
use crate::tracking::{
    EventHistoryLog, MovementStatus, StatusEvent, TrackedEntityState, Transition,
};

/// Sensor health as last reported to the publisher.
///
/// This is a signal for the user interface, never a movement status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SensorSignal {
    /// Waiting for the first fix.
    #[default]
    Pending,
    /// Samples are flowing.
    Active,
    /// The user refused location access; prompt them.
    PermissionDenied,
    /// The sensor reported a failure.
    Unavailable(String),
    /// The sensor subscription closed.
    Ended,
}

pub(crate) enum PublisherCommand {
    ManualPosition {
        lat: f64,
        lon: f64,
        done: oneshot::Sender<()>,
    },
    ManualStatus {
        status: MovementStatus,
        done: oneshot::Sender<Result<(), PublisherError>>,
    },
    SetGhost {
        ghost: bool,
        done: oneshot::Sender<()>,
    },
    RaiseEmergency {
        done: oneshot::Sender<()>,
    },
    ClearEmergency {
        done: oneshot::Sender<()>,
    },
    Stop {
        done: oneshot::Sender<Result<(), StoreError>>,
    },
}

/// Handle to a running [`EntityPublisher`](super::EntityPublisher).
///
/// Dropping the handle without calling [`stop`](Self::stop) still shuts the
/// task down and flushes the final OFFLINE record, but nobody waits for it.
pub struct PublisherHandle {
    pub(crate) entity_id: String,
    pub(crate) commands: mpsc::Sender<PublisherCommand>,
    pub(crate) history: Arc<RwLock<EventHistoryLog>>,
    pub(crate) observed: watch::Receiver<TrackedEntityState>,
    pub(crate) signal: watch::Receiver<SensorSignal>,
    pub(crate) transitions: broadcast::Sender<Transition>,
    pub(crate) cancellation: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

impl PublisherHandle {
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Check whether the publisher task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Publish a manually placed position, bypassing the throttle.
    pub async fn submit_manual_position(&self, lat: f64, lon: f64) -> Result<(), PublisherError> {
        self.request(|done| PublisherCommand::ManualPosition { lat, lon, done })
            .await
    }

    /// Force MOVING or STATIONARY, bypassing the throttle.
    ///
    /// STATIONARY drops the anchor at the last known position; MOVING
    /// re-anchors there and restarts the immobility delay. Fails with
    /// [`PublisherError::NoFix`] before the first fix.
    pub async fn set_manual_status(&self, status: MovementStatus) -> Result<(), PublisherError> {
        if status == MovementStatus::Offline {
            return Err(PublisherError::UnsupportedManualStatus(status));
        }

        let (done, rx) = oneshot::channel();
        self.commands
            .send(PublisherCommand::ManualStatus { status, done })
            .await
            .map_err(|_| PublisherError::AlreadyStopped)?;
        rx.await.map_err(|_| PublisherError::AlreadyStopped)?
    }

    /// Toggle ghost mode. Persistence continues; only group broadcast changes.
    pub async fn set_ghost(&self, ghost: bool) -> Result<(), PublisherError> {
        self.request(|done| PublisherCommand::SetGhost { ghost, done })
            .await
    }

    /// Force visibility to every viewer until explicitly cleared.
    pub async fn raise_emergency(&self) -> Result<(), PublisherError> {
        self.request(|done| PublisherCommand::RaiseEmergency { done })
            .await
    }

    pub async fn clear_emergency(&self) -> Result<(), PublisherError> {
        self.request(|done| PublisherCommand::ClearEmergency { done })
            .await
    }

    /// Local event history, newest first.
    pub fn history(&self) -> Vec<StatusEvent> {
        self.history.read().entries()
    }

    /// Locally observed state, ahead of (or equal to) what reached the store.
    pub fn observed(&self) -> TrackedEntityState {
        self.observed.borrow().clone()
    }

    /// Subscribe to locally observed state changes.
    pub fn subscribe_observed(&self) -> watch::Receiver<TrackedEntityState> {
        self.observed.clone()
    }

    /// Subscribe to sensor health changes.
    pub fn subscribe_signal(&self) -> watch::Receiver<SensorSignal> {
        self.signal.clone()
    }

    pub fn sensor_signal(&self) -> SensorSignal {
        self.signal.borrow().clone()
    }

    /// Subscribe to transitions in detection order.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Stop sharing.
    ///
    /// Cancels the sensor subscription, writes the final
    /// `is_sharing = false, status = OFFLINE` record and waits for the task
    /// to exit. Returns the result of that final write.
    pub async fn stop(self) -> Result<(), PublisherError> {
        let (done, rx) = oneshot::channel();
        self.commands
            .send(PublisherCommand::Stop { done })
            .await
            .map_err(|_| PublisherError::AlreadyStopped)?;

        let result = rx.await.map_err(|_| PublisherError::AlreadyStopped)?;
        let _ = self.task.await;
        result.map_err(PublisherError::from)
    }

    /// Cancel the task without waiting for it.
    pub fn abort(&self) {
        self.cancellation.cancel();
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<()>) -> PublisherCommand,
    ) -> Result<(), PublisherError> {
        let (done, rx) = oneshot::channel();
        self.commands
            .send(build(done))
            .await
            .map_err(|_| PublisherError::AlreadyStopped)?;
        rx.await.map_err(|_| PublisherError::AlreadyStopped)
    }
}

impl std::fmt::Debug for PublisherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherHandle")
            .field("entity_id", &self.entity_id)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
