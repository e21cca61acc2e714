//! Async session viewer.
//!
//! Subscribes to a session in the shared store, feeds every snapshot through
//! a [`ViewerTracker`], re-checks staleness on a fixed interval, and hands
//! transitions and battery levels to the viewer's [`AlertDispatcher`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::tracker::{EntityView, ViewerTracker, ViewerUpdate};
use crate::alert::AlertDispatcher;
use crate::store::SharedPositionStore;
use crate::time::Clock;
use crate::tracking::{
    TrackingConfig, ViewerRole, DEFAULT_EVENT_LOG_CAPACITY, DEFAULT_OFFLINE_TIMEOUT,
};

/// Default staleness re-check interval.
pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Current view of a session, keyed by entity id.
pub type SessionView = HashMap<String, EntityView>;

/// Session viewer configuration.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub role: ViewerRole,
    pub offline_timeout: Duration,
    pub recheck_interval: Duration,
    pub event_log_capacity: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            role: ViewerRole::Group,
            offline_timeout: DEFAULT_OFFLINE_TIMEOUT,
            recheck_interval: DEFAULT_RECHECK_INTERVAL,
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
        }
    }
}

impl ViewerConfig {
    /// Viewer settings matching a tracking configuration.
    pub fn from_tracking(tracking: &TrackingConfig, role: ViewerRole) -> Self {
        Self {
            role,
            offline_timeout: tracking.offline_timeout,
            event_log_capacity: tracking.event_log_capacity,
            ..Default::default()
        }
    }
}

/// Handle to a running session viewer.
pub struct ViewerHandle {
    view: watch::Receiver<SessionView>,
    cancellation: CancellationToken,
    task: JoinHandle<()>,
}

impl ViewerHandle {
    /// Latest view.
    pub fn snapshot(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Cancel the subscription and wait for the task. Armed watch timers
    /// and looping sounds are stopped.
    pub async fn stop(self) {
        self.cancellation.cancel();
        let _ = self.task.await;
    }
}

/// Spawns a task that follows `session_id` for one viewer.
///
/// The task stops when `cancellation` is triggered or the store drops the
/// subscription.
pub fn spawn_session_viewer<S>(
    store: Arc<S>,
    session_id: impl Into<String>,
    config: ViewerConfig,
    dispatcher: AlertDispatcher,
    clock: Clock,
    cancellation: CancellationToken,
) -> ViewerHandle
where
    S: SharedPositionStore + 'static,
{
    let session_id = session_id.into();
    let (view_tx, view_rx) = watch::channel(SessionView::new());
    let token = cancellation.child_token();

    let task = tokio::spawn(run(
        store,
        session_id,
        config,
        dispatcher,
        clock,
        token.clone(),
        view_tx,
    ));

    ViewerHandle {
        view: view_rx,
        cancellation: token,
        task,
    }
}

async fn run<S: SharedPositionStore>(
    store: Arc<S>,
    session_id: String,
    config: ViewerConfig,
    mut dispatcher: AlertDispatcher,
    clock: Clock,
    cancellation: CancellationToken,
    view: watch::Sender<SessionView>,
) {
    tracing::info!(
        session = %session_id,
        role = ?config.role,
        "Session viewer started"
    );

    let mut tracker = ViewerTracker::new(
        config.role,
        config.offline_timeout,
        config.event_log_capacity,
    );
    let mut snapshots = store.subscribe_session(&session_id);
    let mut ticker = tokio::time::interval(config.recheck_interval);

    let initial = snapshots.borrow_and_update().clone();
    let updates = tracker.observe(&initial, clock.now());
    apply(&mut dispatcher, &tracker, updates, true);
    view.send_replace(tracker.views());

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => break,

            changed = snapshots.changed() => {
                if changed.is_err() {
                    tracing::debug!(session = %session_id, "Session subscription closed");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let updates = tracker.observe(&snapshot, clock.now());
                apply(&mut dispatcher, &tracker, updates, true);
                view.send_replace(tracker.views());
            }

            _ = ticker.tick() => {
                let updates = tracker.recheck(clock.now());
                if !updates.is_empty() {
                    apply(&mut dispatcher, &tracker, updates, false);
                    view.send_replace(tracker.views());
                }
            }
        }
    }

    dispatcher.stop_all();
    tracing::info!(session = %session_id, "Session viewer stopped");
}

/// Forward tracker output to the dispatcher, in detection order.
fn apply(
    dispatcher: &mut AlertDispatcher,
    tracker: &ViewerTracker,
    updates: Vec<ViewerUpdate>,
    check_battery: bool,
) {
    for update in updates {
        match update {
            ViewerUpdate::Transition {
                entity_id,
                transition,
            } => {
                dispatcher.on_transition(&entity_id, &transition);
            }
            ViewerUpdate::EmergencyRaised { entity_id, .. } => {
                dispatcher.on_emergency(&entity_id);
            }
            ViewerUpdate::Left { entity_id } => dispatcher.forget_entity(&entity_id),
        }
    }

    if check_battery {
        for (entity_id, view) in tracker.views() {
            dispatcher.on_battery(&entity_id, view.state.battery_level);
        }
    }
}
