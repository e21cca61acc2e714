//! Maps viewer-observed transitions to alert sounds.
//!
//! # Critical watch
//!
//! ```text
//!   transition into watched status ──► arm timer (entity, status)
//!   any transition                 ──► cancel timer first, then maybe re-arm
//!   timer elapses                  ──► play watch sound once
//! ```
//!
//! Cancellation happens synchronously inside [`AlertDispatcher::on_transition`],
//! so a timer never fires after the status has changed away from the watched
//! value.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{AlertConfig, AlertSink, WatchRule};
use crate::tracking::{MovementStatus, Transition};

struct WatchTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl WatchTimer {
    fn cancel(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Per-viewer alert dispatcher.
///
/// Owned by a single viewer task. Arming a watch timer spawns onto the
/// current tokio runtime.
pub struct AlertDispatcher {
    config: AlertConfig,
    sink: Arc<dyn AlertSink>,
    watches: HashMap<(String, MovementStatus), WatchTimer>,
    battery_low: HashSet<String>,
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("config", &self.config)
            .field("armed_watches", &self.watches.len())
            .field("battery_low", &self.battery_low)
            .finish_non_exhaustive()
    }
}

impl AlertDispatcher {
    pub fn new(config: AlertConfig, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            config,
            sink,
            watches: HashMap::new(),
            battery_low: HashSet::new(),
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Replace the configuration. Armed watch timers are dropped because
    /// the watched status or duration may have changed.
    pub fn set_config(&mut self, config: AlertConfig) {
        self.cancel_all_watches();
        self.config = config;
    }

    /// Handle a transition for `entity_id`.
    ///
    /// Returns true if a transition sound was dispatched. A first sighting
    /// (`from == None`) never plays a sound but can arm a watch.
    pub fn on_transition(&mut self, entity_id: &str, transition: &Transition) -> bool {
        self.cancel_watches_for(entity_id);

        if let Some(rule) = self
            .config
            .watch
            .clone()
            .filter(|w| w.status == transition.to)
        {
            self.arm_watch(entity_id, rule);
        }

        if transition.from.is_none() || !self.config.enabled {
            return false;
        }

        let rule = self.config.transitions.get(transition.kind());
        if !rule.enabled {
            tracing::debug!(
                entity = entity_id,
                status = %transition.to,
                "Alert disabled for transition"
            );
            return false;
        }

        tracing::info!(
            entity = entity_id,
            from = ?transition.from,
            to = %transition.to,
            sound = %rule.sound,
            "Transition alert"
        );
        self.sink.play(&rule.sound, self.config.volume, rule.looping);
        true
    }

    /// Handle an emergency override raised by `entity_id`.
    ///
    /// Unlike transitions this plays on a first sighting too, since the
    /// override is what revealed a ghosted entity. Returns true if an alert
    /// fired.
    pub fn on_emergency(&mut self, entity_id: &str) -> bool {
        let rule = &self.config.emergency;
        if !self.config.enabled || !rule.enabled {
            return false;
        }

        tracing::warn!(entity = entity_id, sound = %rule.sound, "Emergency alert");
        self.sink.play(&rule.sound, self.config.volume, rule.looping);
        true
    }

    /// Handle a battery report for `entity_id`.
    ///
    /// Fires once when the level drops below the threshold and re-arms
    /// once it rises back to or above it. Returns true if an alert fired.
    pub fn on_battery(&mut self, entity_id: &str, level: Option<f64>) -> bool {
        let Some(level) = level else {
            return false;
        };

        if level >= self.config.battery_threshold {
            self.battery_low.remove(entity_id);
            return false;
        }

        if !self.battery_low.insert(entity_id.to_string()) {
            return false;
        }

        let rule = &self.config.battery;
        if !self.config.enabled || !rule.enabled {
            return false;
        }

        tracing::info!(
            entity = entity_id,
            level = format!("{:.0}%", level * 100.0),
            "Battery low alert"
        );
        self.sink.play(&rule.sound, self.config.volume, rule.looping);
        true
    }

    /// Drop every timer and battery state for an entity that left the view.
    pub fn forget_entity(&mut self, entity_id: &str) {
        self.cancel_watches_for(entity_id);
        self.battery_low.remove(entity_id);
    }

    /// Cancel every watch timer and silence the sink.
    pub fn stop_all(&mut self) {
        self.cancel_all_watches();
        self.sink.stop_all();
    }

    /// Check whether a watch timer is armed for `(entity_id, status)`.
    pub fn is_watching(&self, entity_id: &str, status: MovementStatus) -> bool {
        self.watches
            .get(&(entity_id.to_string(), status))
            .is_some_and(|timer| !timer.handle.is_finished())
    }

    pub fn armed_watches(&self) -> usize {
        self.watches
            .values()
            .filter(|timer| !timer.handle.is_finished())
            .count()
    }

    fn arm_watch(&mut self, entity_id: &str, rule: WatchRule) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let sink = Arc::clone(&self.sink);
        let volume = self.config.volume;
        let enabled = self.config.enabled;
        let entity = entity_id.to_string();
        let status = rule.status;

        tracing::debug!(
            entity = entity_id,
            status = %status,
            minutes = rule.duration.as_secs() / 60,
            "Critical watch armed"
        );

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(rule.duration) => {
                    if enabled {
                        tracing::warn!(
                            entity = %entity,
                            status = %status,
                            "Critical watch elapsed"
                        );
                        sink.play(&rule.sound, volume, rule.looping);
                    }
                }
            }
        });

        self.watches
            .insert((entity_id.to_string(), status), WatchTimer { cancel, handle });
    }

    fn cancel_watches_for(&mut self, entity_id: &str) {
        let keys: Vec<_> = self
            .watches
            .keys()
            .filter(|(id, _)| id == entity_id)
            .cloned()
            .collect();

        for key in keys {
            if let Some(timer) = self.watches.remove(&key) {
                timer.cancel();
            }
        }
    }

    fn cancel_all_watches(&mut self) {
        for (_, timer) in self.watches.drain() {
            timer.cancel();
        }
    }
}

impl Drop for AlertDispatcher {
    fn drop(&mut self) {
        self.cancel_all_watches();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tokio::sync::mpsc;

    use super::*;
    use crate::alert::{AlertCommand, ChannelAlertSink};

    fn transition(from: Option<MovementStatus>, to: MovementStatus) -> Transition {
        Transition {
            from,
            to,
            at: Utc::now(),
            position: None,
        }
    }

    fn dispatcher(config: AlertConfig) -> (AlertDispatcher, mpsc::UnboundedReceiver<AlertCommand>) {
        let (sink, rx) = ChannelAlertSink::new();
        (AlertDispatcher::new(config, Arc::new(sink)), rx)
    }

    fn watch_config(minutes: u64) -> AlertConfig {
        AlertConfig {
            watch: Some(WatchRule {
                status: MovementStatus::Stationary,
                duration: Duration::from_secs(minutes * 60),
                sound: "watch".to_string(),
                looping: false,
            }),
            ..Default::default()
        }
    }

    fn played(cmd: AlertCommand) -> String {
        match cmd {
            AlertCommand::Play { sound, .. } => sound,
            other => panic!("expected Play, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transition_plays_configured_sound() {
        let (mut dispatcher, mut rx) = dispatcher(AlertConfig::default());

        let fired = dispatcher.on_transition(
            "A",
            &transition(Some(MovementStatus::Stationary), MovementStatus::Moving),
        );

        assert!(fired);
        assert_eq!(
            rx.try_recv().unwrap(),
            AlertCommand::Play {
                sound: "sonar".to_string(),
                volume: 0.8,
                looping: false,
            }
        );
    }

    #[tokio::test]
    async fn test_first_sighting_is_silent() {
        let (mut dispatcher, mut rx) = dispatcher(AlertConfig::default());

        assert!(!dispatcher.on_transition("A", &transition(None, MovementStatus::Moving)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disabled_kind_and_master_switch() {
        let mut config = AlertConfig::default();
        config.transitions.offline.enabled = false;
        let (mut dispatcher, mut rx) = dispatcher(config);

        assert!(!dispatcher.on_transition(
            "A",
            &transition(Some(MovementStatus::Moving), MovementStatus::Offline),
        ));
        assert!(rx.try_recv().is_err());

        let mut config = AlertConfig::default();
        config.enabled = false;
        dispatcher.set_config(config);
        assert!(!dispatcher.on_transition(
            "A",
            &transition(Some(MovementStatus::Offline), MovementStatus::Moving),
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_fires_after_duration() {
        let (mut dispatcher, mut rx) = dispatcher(watch_config(15));

        dispatcher.on_transition(
            "A",
            &transition(Some(MovementStatus::Moving), MovementStatus::Stationary),
        );
        assert_eq!(played(rx.recv().await.unwrap()), "champignon-mario");
        assert!(dispatcher.is_watching("A", MovementStatus::Stationary));

        tokio::time::sleep(Duration::from_secs(14 * 60)).await;
        assert!(rx.try_recv().is_err());

        let cmd = rx.recv().await.unwrap();
        assert_eq!(played(cmd), "watch");
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_cancelled_when_status_changes() {
        let (mut dispatcher, mut rx) = dispatcher(watch_config(15));

        dispatcher.on_transition(
            "A",
            &transition(Some(MovementStatus::Moving), MovementStatus::Stationary),
        );
        let _ = rx.recv().await;

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        dispatcher.on_transition(
            "A",
            &transition(Some(MovementStatus::Stationary), MovementStatus::Moving),
        );
        assert_eq!(played(rx.recv().await.unwrap()), "sonar");
        assert_eq!(dispatcher.armed_watches(), 0);

        tokio::time::sleep(Duration::from_secs(30 * 60)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_rearms_on_reentry() {
        let (mut dispatcher, mut rx) = dispatcher(watch_config(15));

        dispatcher.on_transition("A", &transition(None, MovementStatus::Stationary));
        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        dispatcher.on_transition(
            "A",
            &transition(Some(MovementStatus::Stationary), MovementStatus::Moving),
        );
        dispatcher.on_transition(
            "A",
            &transition(Some(MovementStatus::Moving), MovementStatus::Stationary),
        );
        assert_eq!(played(rx.recv().await.unwrap()), "sonar");
        assert_eq!(played(rx.recv().await.unwrap()), "champignon-mario");

        // The new timer counts from re-entry, not from the first arming
        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(played(rx.recv().await.unwrap()), "watch");
    }

    #[tokio::test(start_paused = true)]
    async fn test_watches_are_per_entity() {
        let (mut dispatcher, mut rx) = dispatcher(watch_config(5));

        dispatcher.on_transition("A", &transition(None, MovementStatus::Stationary));
        dispatcher.on_transition("B", &transition(None, MovementStatus::Stationary));
        assert_eq!(dispatcher.armed_watches(), 2);

        dispatcher.forget_entity("A");
        assert!(!dispatcher.is_watching("A", MovementStatus::Stationary));
        assert!(dispatcher.is_watching("B", MovementStatus::Stationary));

        assert_eq!(played(rx.recv().await.unwrap()), "watch");
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_battery_alert_fires_once_and_rearms() {
        let (mut dispatcher, mut rx) = dispatcher(AlertConfig::default());

        assert!(!dispatcher.on_battery("A", Some(0.8)));
        assert!(dispatcher.on_battery("A", Some(0.4)));
        assert!(!dispatcher.on_battery("A", Some(0.3)));
        assert!(!dispatcher.on_battery("A", None));
        assert_eq!(played(rx.try_recv().unwrap()), "alerte-urgence");
        assert!(rx.try_recv().is_err());

        assert!(!dispatcher.on_battery("A", Some(0.6)));
        assert!(dispatcher.on_battery("A", Some(0.2)));
    }

    #[tokio::test]
    async fn test_emergency_plays_assistance_sound() {
        let (mut dispatcher, mut rx) = dispatcher(AlertConfig::default());

        assert!(dispatcher.on_emergency("A"));
        assert_eq!(
            rx.try_recv().unwrap(),
            AlertCommand::Play {
                sound: "military-sms".to_string(),
                volume: 0.8,
                looping: true,
            }
        );

        let mut config = AlertConfig::default();
        config.emergency.enabled = false;
        let (mut dispatcher, mut rx) = self::dispatcher(config);
        assert!(!dispatcher.on_emergency("A"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_cancels_and_silences() {
        let (mut dispatcher, mut rx) = dispatcher(watch_config(5));

        dispatcher.on_transition("A", &transition(None, MovementStatus::Stationary));
        dispatcher.stop_all();

        assert_eq!(rx.recv().await.unwrap(), AlertCommand::StopAll);
        assert_eq!(dispatcher.armed_watches(), 0);

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }
}
