//! Interval fallback sampler.
//!
//! Where continuous push updates are unavailable, the [`IntervalSampler`]
//! polls a one-shot [`PositionSource`] on a fixed interval (30 s by
//! default) and forwards each fix as a [`SensorEvent`].
//!
//! # Design
//!
//! - `subscribe()` spawns one poll task per subscription
//! - The first poll happens one interval after subscribing; the publisher
//!   already took a one-shot fix through `current_sample()`
//! - The task stops as soon as the subscription receiver is dropped
//! - Exponential backoff on consecutive errors (2^n seconds, capped at 5 minutes)

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::{GeoSampler, SensorError, SensorEvent, SENSOR_CHANNEL_CAPACITY};
use crate::tracking::{PositionSample, DEFAULT_FALLBACK_INTERVAL};

/// Maximum backoff duration (5 minutes).
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// One-shot position provider.
pub trait PositionSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<PositionSample, SensorError>> + Send;
}

impl<F, Fut> PositionSource for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PositionSample, SensorError>> + Send,
{
    fn fetch(&self) -> impl Future<Output = Result<PositionSample, SensorError>> + Send {
        (self)()
    }
}

/// Sampler that polls a [`PositionSource`] on a fixed interval.
pub struct IntervalSampler<S: PositionSource> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: PositionSource> IntervalSampler<S> {
    pub fn new(source: S) -> Self {
        Self::with_interval(source, DEFAULT_FALLBACK_INTERVAL)
    }

    pub fn with_interval(source: S, interval: Duration) -> Self {
        Self {
            source: Arc::new(source),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl<S: PositionSource> GeoSampler for IntervalSampler<S> {
    fn subscribe(&self) -> mpsc::Receiver<SensorEvent> {
        let (tx, rx) = mpsc::channel(SENSOR_CHANNEL_CAPACITY);
        tokio::spawn(poll_loop(Arc::clone(&self.source), self.interval, tx));
        rx
    }

    fn current_sample(&self) -> impl Future<Output = Result<PositionSample, SensorError>> + Send {
        self.source.fetch()
    }
}

async fn poll_loop<S: PositionSource>(
    source: Arc<S>,
    interval: Duration,
    tx: mpsc::Sender<SensorEvent>,
) {
    tracing::debug!(
        interval_secs = interval.as_secs(),
        "Interval sampler started"
    );

    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    let mut consecutive_errors: u32 = 0;

    loop {
        tokio::select! {
            _ = tx.closed() => break,
            _ = ticker.tick() => {}
        }

        if consecutive_errors > 0 {
            let backoff = calculate_backoff(consecutive_errors);
            tracing::debug!(
                backoff_secs = backoff.as_secs(),
                consecutive_errors,
                "Backing off after sensor errors"
            );
            tokio::select! {
                _ = tx.closed() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        let event = match source.fetch().await {
            Ok(sample) => {
                consecutive_errors = 0;
                SensorEvent::Sample(sample)
            }
            Err(e) => {
                consecutive_errors += 1;
                tracing::warn!(error = %e, consecutive_errors, "Position poll failed");
                SensorEvent::Error(e)
            }
        };

        if tx.send(event).await.is_err() {
            break;
        }
    }

    tracing::debug!("Interval sampler stopped");
}

/// Calculate exponential backoff: 2^n seconds, capped at MAX_BACKOFF.
fn calculate_backoff(consecutive_errors: u32) -> Duration {
    let secs = 2u64.saturating_pow(consecutive_errors.min(20));
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;

    #[test]
    fn test_calculate_backoff() {
        assert_eq!(calculate_backoff(1), Duration::from_secs(2));
        assert_eq!(calculate_backoff(3), Duration::from_secs(8));
        assert_eq!(calculate_backoff(10), MAX_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sampler = IntervalSampler::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, SensorError>(PositionSample::new(-22.27, 166.45 + n as f64 * 0.001, Utc::now()))
            }
        });

        let start = tokio::time::Instant::now();
        let mut rx = sampler.subscribe();

        assert!(matches!(rx.recv().await, Some(SensorEvent::Sample(_))));
        assert!(start.elapsed() >= DEFAULT_FALLBACK_INTERVAL);
        assert!(matches!(rx.recv().await, Some(SensorEvent::Sample(_))));
        assert!(start.elapsed() >= DEFAULT_FALLBACK_INTERVAL * 2);
        assert!(start.elapsed() < DEFAULT_FALLBACK_INTERVAL * 2 + Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_does_not_repeat_current_sample() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sampler = IntervalSampler::with_interval(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, SensorError>(PositionSample::new(0.0, 0.0, Utc::now())) }
            },
            Duration::from_secs(30),
        );

        assert!(sampler.current_sample().await.is_ok());
        let mut rx = sampler.subscribe();

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(matches!(rx.recv().await, Some(SensorEvent::Sample(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_forwarded() {
        let sampler = IntervalSampler::with_interval(
            || async { Err::<PositionSample, _>(SensorError::PermissionDenied) },
            Duration::from_secs(5),
        );

        let mut rx = sampler.subscribe();
        assert_eq!(
            rx.recv().await,
            Some(SensorEvent::Error(SensorError::PermissionDenied))
        );
        assert!(sampler.current_sample().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_receiver_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sampler = IntervalSampler::with_interval(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, SensorError>(PositionSample::new(0.0, 0.0, Utc::now())) }
            },
            Duration::from_secs(1),
        );

        let mut rx = sampler.subscribe();
        let _ = rx.recv().await;
        drop(rx);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(calls.load(Ordering::SeqCst) <= 2);
    }
}
