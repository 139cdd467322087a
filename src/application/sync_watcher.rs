//! Drives a progress source until its tracker converges.
//!
//! Ticks on a fine cadence but only re-queries every `requery_every` ticks;
//! intermediate ticks reuse the last reading.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use super::convergence_tracker::{Convergence, ConvergenceTracker, Observation};
use super::progress_poller::{ProgressPoller, RetryPolicy};
use crate::domain::errors::PollError;
use crate::domain::models::PollingConfig;
use crate::domain::ports::ProgressSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub tick: Duration,
    pub requery_every: u64,
}

impl Cadence {
    pub const fn from_config(polling: &PollingConfig) -> Self {
        Self {
            tick: polling.tick(),
            requery_every: if polling.requery_every_ticks == 0 {
                1
            } else {
                polling.requery_every_ticks
            },
        }
    }
}

/// A source queried alongside the tracked one, for logging only.
pub struct Companion<'a> {
    pub source: &'a dyn ProgressSource,
    pub policy: RetryPolicy,
}

pub struct SyncWatcher<'a> {
    poller: &'a ProgressPoller,
    source: &'a dyn ProgressSource,
    policy: RetryPolicy,
    cadence: Cadence,
    companion: Option<Companion<'a>>,
}

impl<'a> SyncWatcher<'a> {
    pub const fn new(
        poller: &'a ProgressPoller,
        source: &'a dyn ProgressSource,
        policy: RetryPolicy,
        cadence: Cadence,
    ) -> Self {
        Self {
            poller,
            source,
            policy,
            cadence,
            companion: None,
        }
    }

    #[must_use]
    pub fn with_companion(mut self, companion: Companion<'a>) -> Self {
        self.companion = Some(companion);
        self
    }

    /// Sample until `tracker` converges.
    ///
    /// Fatal poll errors end the watch. A propagated (non-fatal) error before
    /// the first reading also ends it; once sampling, the last reading is kept
    /// and the source is retried on the next coarse tick.
    pub async fn run(&self, tracker: &mut ConvergenceTracker) -> Result<Convergence, PollError> {
        if let Some(convergence) = tracker.convergence() {
            return Ok(convergence.clone());
        }

        let source = self.source.name();
        let mut tick: u64 = 0;
        loop {
            if tick % self.cadence.requery_every == 0 {
                self.query_companion().await?;

                match self.poller.query(self.source, &self.policy).await {
                    Ok(reading) => {
                        let at = Instant::now();
                        info!(
                            source,
                            era = %reading.era,
                            epoch = ?reading.epoch,
                            block = reading.block,
                            slot = reading.slot,
                            sync_percent = ?reading.sync_percent,
                            "sync progress"
                        );
                        if let Observation::Converged(convergence) = tracker.observe(reading, at) {
                            return Ok(convergence);
                        }
                    }
                    Err(e) if e.is_fatal() || !tracker.has_started() => return Err(e),
                    Err(e) => {
                        warn!(source, error = %e, "keeping last reading until the next query");
                    }
                }
            }

            sleep(self.cadence.tick).await;
            tick += 1;
        }
    }

    async fn query_companion(&self) -> Result<(), PollError> {
        let Some(companion) = &self.companion else {
            return Ok(());
        };
        match self.poller.query(companion.source, &companion.policy).await {
            Ok(reading) => {
                info!(
                    source = companion.source.name(),
                    era = %reading.era,
                    epoch = ?reading.epoch,
                    block = reading.block,
                    sync_percent = ?reading.sync_percent,
                    "companion tip"
                );
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(source = companion.source.name(), error = %e, "companion query failed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::progress_poller::Exhaustion;
    use crate::domain::errors::ParseError;
    use crate::domain::models::{ProgressReading, SyncPrecision};
    use crate::domain::ports::ProbeFailure;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Emits scripted sync percents; `None` entries fail the probe.
    struct PercentSource {
        precision: SyncPrecision,
        script: Mutex<VecDeque<Option<f64>>>,
        calls: Mutex<u32>,
    }

    impl PercentSource {
        fn new(precision: SyncPrecision, script: Vec<Option<f64>>) -> Self {
            Self {
                precision,
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ProgressSource for PercentSource {
        fn name(&self) -> &str {
            "percent"
        }

        fn precision(&self) -> SyncPrecision {
            self.precision
        }

        async fn query(&self) -> Result<String, ProbeFailure> {
            *self.calls.lock().unwrap() += 1;
            match self.script.lock().unwrap().pop_front().flatten() {
                Some(p) => Ok(p.to_string()),
                None => Err(ProbeFailure::new("probe failed")),
            }
        }

        fn parse(&self, raw: &str) -> Result<ProgressReading, ParseError> {
            let percent: f64 = raw.parse().map_err(|_| ParseError::NotANumber {
                field: "sync_percent",
                value: raw.to_string(),
            })?;
            Ok(ProgressReading {
                epoch: Some(1),
                block: 1,
                hash: String::new(),
                slot: 1,
                era: String::new(),
                sync_percent: Some(self.precision.normalize(percent)),
            })
        }
    }

    fn cadence() -> Cadence {
        Cadence {
            tick: Duration::from_secs(1),
            requery_every: 60,
        }
    }

    fn no_retry() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(5), 1, Exhaustion::Propagate)
    }

    #[tokio::test(start_paused = true)]
    async fn test_float_source_converges_on_third_coarse_tick() {
        let source = PercentSource::new(
            SyncPrecision::Float,
            vec![Some(30.0), Some(55.2), Some(99.995)],
        );
        let poller = ProgressPoller::new();
        let mut tracker = ConvergenceTracker::for_precision(SyncPrecision::Float);
        let start = Instant::now();

        let convergence = SyncWatcher::new(&poller, &source, no_retry(), cadence())
            .run(&mut tracker)
            .await
            .unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(convergence.reading.sync_percent, Some(99.995));
        assert_eq!(convergence.elapsed, Duration::from_secs(120));
        assert_eq!(start.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_integer_source_converges_at_hundred() {
        let source = PercentSource::new(
            SyncPrecision::Integer,
            vec![Some(20.0), Some(60.0), Some(99.9), Some(100.0)],
        );
        let poller = ProgressPoller::new();
        let mut tracker = ConvergenceTracker::for_precision(SyncPrecision::Integer);

        let convergence = SyncWatcher::new(&poller, &source, no_retry(), cadence())
            .run(&mut tracker)
            .await
            .unwrap();

        // 99.9 truncates to 99 and must not converge.
        assert_eq!(source.calls(), 4);
        assert_eq!(convergence.samples, 4);
        assert_eq!(convergence.elapsed, Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_before_first_reading_propagates() {
        let source = PercentSource::new(SyncPrecision::Float, vec![None]);
        let poller = ProgressPoller::new();
        let mut tracker = ConvergenceTracker::for_precision(SyncPrecision::Float);

        let err = SyncWatcher::new(&poller, &source, no_retry(), cadence())
            .run(&mut tracker)
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Exhausted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_while_sampling_keeps_last_reading() {
        let source = PercentSource::new(
            SyncPrecision::Float,
            vec![Some(10.0), None, Some(100.0)],
        );
        let poller = ProgressPoller::new();
        let mut tracker = ConvergenceTracker::for_precision(SyncPrecision::Float);

        let convergence = SyncWatcher::new(&poller, &source, no_retry(), cadence())
            .run(&mut tracker)
            .await
            .unwrap();
        assert_eq!(source.calls(), 3);
        assert_eq!(convergence.elapsed, Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_companion_stops_the_watch() {
        let source = PercentSource::new(SyncPrecision::Float, vec![Some(10.0), Some(20.0)]);
        let companion = PercentSource::new(SyncPrecision::Integer, vec![Some(5.0), None]);
        let poller = ProgressPoller::new();
        let mut tracker = ConvergenceTracker::for_precision(SyncPrecision::Float);

        let err = SyncWatcher::new(&poller, &source, no_retry(), cadence())
            .with_companion(Companion {
                source: &companion,
                policy: RetryPolicy::new(Duration::from_secs(60), 1, Exhaustion::Abort),
            })
            .run(&mut tracker)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(source.calls(), 1);
        assert_eq!(companion.calls(), 2);
    }
}
