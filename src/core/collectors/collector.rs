//! Timer-driven sampling loop.

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::traits::{CollectorResult, DataProducer};
use crate::core::handoff::HandoffSender;

/// Samples a producer every `interval` and hands each snapshot to the paired
/// publisher.
///
/// The first sample is taken right away. A send waits for the publisher, so a
/// slow publisher delays sampling instead of piling up snapshots.
pub struct Collector<P: DataProducer> {
    producer: P,
    interval: Duration,
    output: HandoffSender<P::Output>,
    cancel: CancellationToken,
}

impl<P: DataProducer> Collector<P> {
    pub fn new(
        producer: P,
        interval: Duration,
        output: HandoffSender<P::Output>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            producer,
            interval,
            output,
            cancel,
        }
    }

    /// Runs until cancelled or a fatal error.
    ///
    /// Cancellation is observed while waiting for the timer, the driver or the
    /// publisher; an abandoned snapshot is dropped.
    pub async fn run(mut self) -> CollectorResult<()> {
        let name = self.producer.name().to_string();
        info!("{} collector loop started (interval: {:?})", name, self.interval);

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let sampled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                sampled = self.producer.produce() => sampled,
            };

            let snapshot = match sampled {
                Ok(snapshot) => snapshot,
                Err(e) if e.is_fatal() => {
                    error!("{} collector failed: {}", name, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("{} sample skipped: {}", name, e);
                    continue;
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("{} snapshot dropped at shutdown", name);
                    break;
                }
                sent = self.output.send(snapshot) => {
                    if let Err(e) = sent {
                        error!("{} collector failed: {}", name, e);
                        return Err(e.into());
                    }
                }
            }
        }

        info!("Exiting {} collector loop", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use tokio::time::{sleep, timeout, Instant};
    use tracing_test::traced_test;

    use super::*;
    use crate::core::{
        collectors::error::CollectorError,
        drivers::DriverError,
        handoff,
        snapshot::EnvironmentSnapshot,
    };

    /// Counts `produce` calls and fails on the listed call numbers.
    struct Counting {
        calls: Arc<AtomicUsize>,
        fail_on: Vec<(usize, fn() -> DriverError)>,
    }

    impl Counting {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: Arc::clone(&calls),
                    fail_on: Vec::new(),
                },
                calls,
            )
        }
    }

    #[async_trait::async_trait]
    impl DataProducer for Counting {
        type Output = EnvironmentSnapshot;

        fn name(&self) -> &str {
            "counting"
        }

        async fn produce(&mut self) -> CollectorResult<EnvironmentSnapshot> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((_, make)) = self.fail_on.iter().find(|(at, _)| *at == n) {
                return Err(make().into());
            }
            Ok(EnvironmentSnapshot {
                temperature: n as f32,
                ..Default::default()
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_sample_is_immediate() {
        let (producer, _) = Counting::new();
        let (tx, mut rx) = handoff::channel();
        let cancel = CancellationToken::new();
        let interval = Duration::from_secs(3600);
        let task = tokio::spawn(Collector::new(producer, interval, tx, cancel.clone()).run());

        let start = Instant::now();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.temperature, 0.0);
        assert!(start.elapsed() < interval);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.temperature, 1.0);
        assert!(start.elapsed() >= interval);

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_until_publisher_receives() {
        let (producer, calls) = Counting::new();
        let (tx, _rx) = handoff::channel::<EnvironmentSnapshot>();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            Collector::new(producer, Duration::from_secs(1), tx, cancel.clone()).run(),
        );

        sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_transient_error_skips_sample() {
        let (mut producer, _) = Counting::new();
        producer.fail_on = vec![(0, || DriverError::Timeout(Duration::from_secs(30)))];
        let (tx, mut rx) = handoff::channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            Collector::new(producer, Duration::from_secs(5), tx, cancel.clone()).run(),
        );

        let next = rx.recv().await.unwrap();
        assert_eq!(next.temperature, 1.0);
        assert!(logs_contain("counting sample skipped"));

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_ends_collector() {
        let (mut producer, calls) = Counting::new();
        producer.fail_on = vec![(1, || DriverError::Read("remote I/O error".into()))];
        let (tx, mut rx) = handoff::channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            Collector::new(producer, Duration::from_secs(5), tx, cancel.clone()).run(),
        );

        assert!(rx.recv().await.is_some());
        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(CollectorError::Driver(DriverError::Read(_)))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sample_after_cancel() {
        let (producer, calls) = Counting::new();
        let (tx, mut rx) = handoff::channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            Collector::new(producer, Duration::from_secs(1), tx, cancel.clone()).run(),
        );

        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        cancel.cancel();
        timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let taken = calls.load(Ordering::SeqCst);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), taken);
    }

    #[tokio::test]
    async fn test_publisher_gone_is_fatal() {
        let (producer, _) = Counting::new();
        let (tx, rx) = handoff::channel();
        drop(rx);
        let result = Collector::new(
            producer,
            Duration::from_secs(1),
            tx,
            CancellationToken::new(),
        )
        .run()
        .await;
        assert!(matches!(result, Err(CollectorError::Handoff(_))));
    }
}
