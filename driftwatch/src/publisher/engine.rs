//! The per-entity publisher task.
//!
//! One task owns one entity's [`TrackedEntityState`] for its whole sharing
//! lifetime. Every input (sensor samples, handle commands, the offline
//! watchdog, cancellation) is serialized through a single `select!` loop, so
//! the classifier and anchor are never touched concurrently.
//!
//! ```text
//!  GeoSampler ──► MotionClassifier ──► UpdateThrottle ──► SharedPositionStore
//!                        │
//!                        └──► EventHistoryLog / transition broadcast
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::handle::{PublisherCommand, PublisherHandle, SensorSignal};
use super::PublisherError;
use crate::sampler::{GeoSampler, SensorError, SensorEvent};
use crate::store::{SharedPositionStore, StoreError};
use crate::time::Clock;
use crate::tracking::{
    EntityProfile, EventHistoryLog, MotionClassifier, MovementStatus, PositionSample,
    ThrottleDecision, TrackedEntityState, TrackingConfig, Transition, UpdateThrottle,
    VisibilityGate,
};

/// Handle command queue depth.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Transition broadcast buffer.
const TRANSITION_CHANNEL_CAPACITY: usize = 64;

/// Publishes one tracked entity to the shared store.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(MemoryPositionStore::new());
/// let (sampler, feed) = ChannelSampler::new();
/// let handle = EntityPublisher::new(profile, TrackingConfig::default(), sampler, store)
///     .start();
///
/// feed.push(sample).await;
/// handle.stop().await?;
/// ```
pub struct EntityPublisher<G, S> {
    profile: EntityProfile,
    config: TrackingConfig,
    sampler: G,
    store: Arc<S>,
    clock: Clock,
    cancellation: CancellationToken,
    ghost: bool,
}

impl<G, S> EntityPublisher<G, S>
where
    G: GeoSampler + 'static,
    S: SharedPositionStore + 'static,
{
    pub fn new(profile: EntityProfile, config: TrackingConfig, sampler: G, store: Arc<S>) -> Self {
        Self {
            profile,
            config,
            sampler,
            store,
            clock: Clock::new(),
            cancellation: CancellationToken::new(),
            ghost: false,
        }
    }

    /// Start sharing in ghost mode, so not even the first fix reaches the
    /// group.
    pub fn with_ghost(mut self, ghost: bool) -> Self {
        self.ghost = ghost;
        self
    }

    /// Use a shared clock (replays, tests).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Stop when `parent` is cancelled.
    pub fn with_cancellation(mut self, parent: &CancellationToken) -> Self {
        self.cancellation = parent.child_token();
        self
    }

    /// Start sharing.
    ///
    /// Spawns the publisher task. The anchor is seeded from a one-shot fix
    /// before the sensor subscription starts.
    pub fn start(self) -> PublisherHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let history = Arc::new(RwLock::new(EventHistoryLog::with_capacity(
            self.config.event_log_capacity,
        )));
        let mut gate = VisibilityGate::new();
        gate.set_ghost(self.ghost);
        let mut record = TrackedEntityState::new(&self.profile);
        gate.stamp(&mut record);
        let (observed_tx, observed_rx) = watch::channel(record.clone());
        let (signal_tx, signal_rx) = watch::channel(SensorSignal::Pending);
        let (transitions_tx, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);

        let worker = Worker {
            classifier: MotionClassifier::new(self.config.classifier.clone()),
            throttle: UpdateThrottle::new(self.config.throttle_interval),
            gate,
            record,
            store: self.store,
            config: self.config,
            clock: self.clock,
            history: Arc::clone(&history),
            observed: observed_tx,
            signal: signal_tx,
            transitions: transitions_tx.clone(),
            pending_priority_write: false,
            offline_declared: false,
        };

        let cancellation = self.cancellation.clone();
        let task = tokio::spawn(run(
            worker,
            self.sampler,
            commands_rx,
            self.cancellation,
        ));

        PublisherHandle {
            entity_id: self.profile.entity_id,
            commands: commands_tx,
            history,
            observed: observed_rx,
            signal: signal_rx,
            transitions: transitions_tx,
            cancellation,
            task,
        }
    }
}

/// Mutable state owned by the publisher task.
struct Worker<S> {
    classifier: MotionClassifier,
    throttle: UpdateThrottle,
    gate: VisibilityGate,
    /// Locally observed record, authoritative for this entity.
    record: TrackedEntityState,
    store: Arc<S>,
    config: TrackingConfig,
    clock: Clock,
    history: Arc<RwLock<EventHistoryLog>>,
    observed: watch::Sender<TrackedEntityState>,
    signal: watch::Sender<SensorSignal>,
    transitions: broadcast::Sender<Transition>,
    /// A transition or visibility change has not reached the store yet.
    pending_priority_write: bool,
    /// The watchdog already fired for the current outage.
    offline_declared: bool,
}

async fn run<G, S>(
    mut worker: Worker<S>,
    sampler: G,
    mut commands: mpsc::Receiver<PublisherCommand>,
    cancellation: CancellationToken,
) where
    G: GeoSampler,
    S: SharedPositionStore,
{
    let entity = worker.record.entity_id.clone();
    tracing::info!(
        entity = %entity,
        session = ?worker.record.session_id,
        "Sharing started"
    );

    match sampler.current_sample().await {
        Ok(sample) => {
            worker.handle_sample(sample).await;
        }
        Err(e) => worker.report_sensor_error(e),
    }

    let mut sensor = Some(sampler.subscribe());
    let offline_timeout = worker.config.offline_timeout;
    let watchdog = tokio::time::sleep(offline_timeout);
    tokio::pin!(watchdog);

    let final_write = loop {
        tokio::select! {
            biased;

            _ = cancellation.cancelled() => {
                tracing::debug!(entity = %entity, "Publisher cancelled");
                drop(sensor.take());
                break worker.shutdown().await;
            }

            command = commands.recv() => match command {
                Some(PublisherCommand::Stop { done }) => {
                    drop(sensor.take());
                    let result = worker.shutdown().await;
                    let _ = done.send(result.clone());
                    break result;
                }
                Some(PublisherCommand::ManualPosition { lat, lon, done }) => {
                    let sample = worker.manual_sample(lat, lon);
                    if worker.handle_sample(sample).await {
                        watchdog.as_mut().reset(tokio::time::Instant::now() + offline_timeout);
                    }
                    let _ = done.send(());
                }
                Some(PublisherCommand::ManualStatus { status, done }) => {
                    let result = worker.force_status(status).await;
                    let _ = done.send(result);
                }
                Some(other) => worker.handle_visibility(other).await,
                None => {
                    tracing::debug!(entity = %entity, "Publisher handle dropped");
                    drop(sensor.take());
                    break worker.shutdown().await;
                }
            },

            event = next_event(&mut sensor) => match event {
                Some(SensorEvent::Sample(sample)) => {
                    if worker.handle_sample(sample).await {
                        watchdog.as_mut().reset(tokio::time::Instant::now() + offline_timeout);
                    }
                }
                Some(SensorEvent::Error(e)) => worker.report_sensor_error(e),
                None => {
                    tracing::warn!(entity = %entity, "Sensor feed ended");
                    worker.signal.send_replace(SensorSignal::Ended);
                    sensor = None;
                }
            },

            _ = &mut watchdog, if !worker.offline_declared => {
                worker.declare_offline().await;
            }
        }
    };

    match final_write {
        Ok(()) => tracing::info!(entity = %entity, "Sharing stopped"),
        Err(e) => tracing::warn!(entity = %entity, error = %e, "Sharing stopped, final write failed"),
    }
}

/// Next sensor event, or never once the subscription is gone.
async fn next_event(sensor: &mut Option<mpsc::Receiver<SensorEvent>>) -> Option<SensorEvent> {
    match sensor {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl<S: SharedPositionStore> Worker<S> {
    /// Classify and maybe publish one sample.
    ///
    /// Returns false if the sample was invalid and dropped.
    async fn handle_sample(&mut self, sample: PositionSample) -> bool {
        let entity = self.record.entity_id.clone();
        let Some(classification) = self.classifier.observe(&sample) else {
            tracing::debug!(entity = %entity, "Dropped invalid sample");
            return false;
        };

        self.offline_declared = false;
        self.signal.send_if_modified(|signal| {
            let changed = *signal != SensorSignal::Active;
            *signal = SensorSignal::Active;
            changed
        });

        let now = sample.captured_at;
        let record = &mut self.record;
        record.is_sharing = true;
        record.status = classification.status;
        record.anchor = self.classifier.anchor();
        record.anchor_set_at = self.classifier.anchor_set_at();
        record.last_position = Some(sample.position);
        record.accuracy_m = sample.accuracy_m;
        record.last_active_at = Some(now);
        if sample.battery_level.is_some() {
            record.battery_level = sample.battery_level;
            record.charging = sample.charging;
        }

        tracing::trace!(
            entity = %entity,
            lat = format!("{:.6}", sample.position.lat),
            lon = format!("{:.6}", sample.position.lon),
            distance_m = ?classification.distance_m.map(|d| format!("{:.1}", d)),
            accuracy_m = ?sample.accuracy_m,
            "Sample"
        );

        if let Some(transition) = &classification.transition {
            self.note_transition(transition);
        }
        self.observed.send_replace(self.record.clone());

        let decision = self
            .throttle
            .decide(now, self.pending_priority_write || sample.is_manual());

        match decision {
            ThrottleDecision::Skip => {
                tracing::debug!(entity = %entity, "Routine update throttled");
            }
            ThrottleDecision::Routine => {
                let _ = self.publish(now, false).await;
            }
            ThrottleDecision::Immediate => {
                let retry = self.pending_priority_write;
                let _ = self.publish(now, retry).await;
            }
        }
        true
    }

    fn manual_sample(&self, lat: f64, lon: f64) -> PositionSample {
        let mut sample = PositionSample::manual(lat, lon, self.clock.now());
        sample.battery_level = self.record.battery_level;
        sample.charging = self.record.charging;
        sample
    }

    async fn handle_visibility(&mut self, command: PublisherCommand) {
        let entity = self.record.entity_id.clone();
        let done = match command {
            PublisherCommand::SetGhost { ghost, done } => {
                if self.gate.is_ghost() != ghost {
                    tracing::info!(entity = %entity, ghost, "Ghost mode changed");
                    self.gate.set_ghost(ghost);
                    self.pending_priority_write = true;
                }
                done
            }
            PublisherCommand::RaiseEmergency { done } => {
                if self.gate.raise_emergency() {
                    tracing::warn!(entity = %entity, "Emergency override raised");
                    self.pending_priority_write = true;
                }
                done
            }
            PublisherCommand::ClearEmergency { done } => {
                if self.gate.clear_emergency() {
                    tracing::info!(entity = %entity, "Emergency override cleared");
                    self.pending_priority_write = true;
                }
                done
            }
            PublisherCommand::ManualPosition { done, .. } => done,
            PublisherCommand::ManualStatus { .. } | PublisherCommand::Stop { .. } => return,
        };

        self.gate.stamp(&mut self.record);
        self.observed.send_replace(self.record.clone());

        // Nothing to reveal before the first fix
        if self.pending_priority_write && self.record.is_sharing {
            let now = self.clock.now();
            let _ = self.publish(now, true).await;
        }
        let _ = done.send(());
    }

    /// Manual MOVING / STATIONARY at the last known position.
    async fn force_status(&mut self, status: MovementStatus) -> Result<(), PublisherError> {
        if status == MovementStatus::Offline {
            return Err(PublisherError::UnsupportedManualStatus(status));
        }
        let Some(position) = self.record.last_position else {
            return Err(PublisherError::NoFix);
        };

        let now = self.clock.now();
        tracing::info!(
            entity = %self.record.entity_id,
            status = %status,
            "Manual status override"
        );
        if let Some(transition) = self.classifier.force(status, position, now) {
            self.note_transition(&transition);
        }

        self.record.status = status;
        self.record.anchor = self.classifier.anchor();
        self.record.anchor_set_at = self.classifier.anchor_set_at();
        self.observed.send_replace(self.record.clone());

        self.publish(now, true).await?;
        Ok(())
    }

    fn note_transition(&mut self, transition: &Transition) {
        tracing::info!(
            entity = %self.record.entity_id,
            from = ?transition.from,
            to = %transition.to,
            "Status transition"
        );
        self.history.write().append(transition.to_event());
        let _ = self.transitions.send(transition.clone());
        self.pending_priority_write = true;
    }

    fn report_sensor_error(&mut self, error: SensorError) {
        let entity = &self.record.entity_id;
        let signal = match &error {
            SensorError::PermissionDenied => {
                tracing::warn!(entity = %entity, "Location permission denied");
                SensorSignal::PermissionDenied
            }
            SensorError::Unavailable(reason) => {
                tracing::warn!(entity = %entity, reason = %reason, "Location unavailable");
                SensorSignal::Unavailable(reason.clone())
            }
            SensorError::Timeout => {
                tracing::debug!(entity = %entity, "Position fix timed out");
                SensorSignal::Unavailable(error.to_string())
            }
        };
        self.signal.send_replace(signal);
    }

    /// Watchdog: no sample for `offline_timeout`.
    async fn declare_offline(&mut self) {
        self.offline_declared = true;
        let now = self.clock.now();

        let Some(transition) = self.classifier.mark_offline(now, self.record.last_position) else {
            return;
        };

        tracing::warn!(
            entity = %self.record.entity_id,
            timeout_secs = self.config.offline_timeout.as_secs(),
            "No position sample within offline timeout"
        );
        self.record.status = MovementStatus::Offline;
        self.note_transition(&transition);
        self.observed.send_replace(self.record.clone());
        let _ = self.publish(now, true).await;
    }

    /// Flush the final `is_sharing = false, status = OFFLINE` record.
    async fn shutdown(&mut self) -> Result<(), StoreError> {
        let now = self.clock.now();

        if let Some(from) = self.classifier.status() {
            if from != MovementStatus::Offline {
                self.note_transition(&Transition {
                    from: Some(from),
                    to: MovementStatus::Offline,
                    at: now,
                    position: self.record.last_position,
                });
            }
        }

        self.classifier.reset();
        self.throttle.reset();
        self.record.is_sharing = false;
        self.record.status = MovementStatus::Offline;
        self.record.anchor = None;
        self.record.anchor_set_at = None;
        self.observed.send_replace(self.record.clone());

        self.publish(now, true).await
    }

    /// Write the current record to the store.
    ///
    /// With `retry`, a failed write is attempted once more before giving
    /// up; a priority write that still fails stays pending so the next
    /// sample bypasses the throttle.
    async fn publish(&mut self, now: DateTime<Utc>, retry: bool) -> Result<(), StoreError> {
        let mut outgoing = self.record.clone();
        self.gate.stamp(&mut outgoing);
        outgoing.last_published_at = Some(now);

        let mut result = self.write(&outgoing).await;
        if retry {
            if let Err(e) = &result {
                tracing::warn!(
                    entity = %outgoing.entity_id,
                    error = %e,
                    "Priority write failed, retrying"
                );
                result = self.write(&outgoing).await;
            }
        }

        match &result {
            Ok(()) => {
                self.throttle.record_publish(now);
                self.pending_priority_write = false;
                self.record.last_published_at = Some(now);
                self.observed.send_replace(self.record.clone());
                tracing::debug!(
                    entity = %outgoing.entity_id,
                    status = %outgoing.status,
                    sharing = outgoing.is_sharing,
                    ghost = outgoing.is_ghost,
                    "Published"
                );
            }
            Err(e) => {
                tracing::warn!(
                    entity = %outgoing.entity_id,
                    error = %e,
                    pending = self.pending_priority_write,
                    "Store write failed"
                );
            }
        }
        result
    }

    async fn write(&self, record: &TrackedEntityState) -> Result<(), StoreError> {
        let timeout = self.config.write_timeout;
        match tokio::time::timeout(timeout, self.store.upsert(record)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(timeout)),
        }
    }
}
