//! Push-based sampler fed from outside the engine.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{GeoSampler, SensorError, SensorEvent, SENSOR_CHANNEL_CAPACITY};
use crate::tracking::PositionSample;

#[derive(Debug, Default)]
struct Shared {
    subscribers: Vec<mpsc::Sender<SensorEvent>>,
    last_sample: Option<PositionSample>,
    denied: bool,
}

/// Sampler whose events are pushed through a [`SensorFeed`].
///
/// This is how platform location callbacks enter the engine: the callback
/// holds the feed, the publisher task holds the sampler.
#[derive(Debug, Clone)]
pub struct ChannelSampler {
    shared: Arc<Mutex<Shared>>,
}

/// Producer half of a [`ChannelSampler`].
#[derive(Debug, Clone)]
pub struct SensorFeed {
    shared: Arc<Mutex<Shared>>,
}

impl ChannelSampler {
    pub fn new() -> (Self, SensorFeed) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            SensorFeed { shared },
        )
    }
}

impl GeoSampler for ChannelSampler {
    fn subscribe(&self) -> mpsc::Receiver<SensorEvent> {
        let (tx, rx) = mpsc::channel(SENSOR_CHANNEL_CAPACITY);
        self.shared.lock().subscribers.push(tx);
        rx
    }

    async fn current_sample(&self) -> Result<PositionSample, SensorError> {
        let (denied, last) = {
            let shared = self.shared.lock();
            (shared.denied, shared.last_sample.clone())
        };
        if denied {
            return Err(SensorError::PermissionDenied);
        }
        last.ok_or_else(|| SensorError::Unavailable("no fix yet".to_string()))
    }
}

impl SensorFeed {
    /// Deliver a sample to every live subscriber.
    pub async fn push(&self, sample: PositionSample) {
        {
            let mut shared = self.shared.lock();
            shared.last_sample = Some(sample.clone());
            shared.denied = false;
        }
        self.broadcast(SensorEvent::Sample(sample)).await;
    }

    /// Record a fix for [`GeoSampler::current_sample`] without notifying
    /// subscribers.
    pub fn set_current(&self, sample: PositionSample) {
        self.shared.lock().last_sample = Some(sample);
    }

    /// Report a sensor failure to every live subscriber.
    pub async fn fail(&self, error: SensorError) {
        if error == SensorError::PermissionDenied {
            self.shared.lock().denied = true;
        }
        self.broadcast(SensorEvent::Error(error)).await;
    }

    /// Number of subscriptions still being listened to.
    pub fn subscriber_count(&self) -> usize {
        let mut shared = self.shared.lock();
        shared.subscribers.retain(|tx| !tx.is_closed());
        shared.subscribers.len()
    }

    async fn broadcast(&self, event: SensorEvent) {
        let subscribers: Vec<_> = {
            let mut shared = self.shared.lock();
            shared.subscribers.retain(|tx| !tx.is_closed());
            shared.subscribers.clone()
        };

        for tx in subscribers {
            // A subscriber dropped mid-broadcast is pruned on the next call
            let _ = tx.send(event.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_push_reaches_subscribers() {
        let (sampler, feed) = ChannelSampler::new();
        let mut a = sampler.subscribe();
        let mut b = sampler.subscribe();

        let sample = PositionSample::new(-22.27, 166.45, Utc::now());
        feed.push(sample.clone()).await;

        assert_eq!(a.recv().await, Some(SensorEvent::Sample(sample.clone())));
        assert_eq!(b.recv().await, Some(SensorEvent::Sample(sample)));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let (sampler, feed) = ChannelSampler::new();
        let rx = sampler.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        assert_eq!(feed.subscriber_count(), 0);
        feed.push(PositionSample::new(0.0, 0.0, Utc::now())).await;
    }

    #[tokio::test]
    async fn test_current_sample() {
        let (sampler, feed) = ChannelSampler::new();
        assert!(matches!(
            sampler.current_sample().await,
            Err(SensorError::Unavailable(_))
        ));

        let sample = PositionSample::new(-22.27, 166.45, Utc::now());
        feed.set_current(sample.clone());
        assert_eq!(sampler.current_sample().await.unwrap(), sample);

        feed.fail(SensorError::PermissionDenied).await;
        assert_eq!(
            sampler.current_sample().await,
            Err(SensorError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_errors_are_forwarded() {
        let (sampler, feed) = ChannelSampler::new();
        let mut rx = sampler.subscribe();

        feed.fail(SensorError::Unavailable("gps off".into())).await;

        assert_eq!(
            rx.recv().await,
            Some(SensorEvent::Error(SensorError::Unavailable("gps off".into())))
        );
    }
}
