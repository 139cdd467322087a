//! Convergence Tracker
//!
//! `NotStarted -> Sampling -> Converged`. The tracker leaves `NotStarted` on the
//! first reading that carries a sync percent and records the instant of that
//! reading; it converges once a reading meets the threshold of its policy.
//! Convergence is terminal: later observations are ignored.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::models::{ProgressReading, SyncPrecision};

/// Percent drop tolerated between consecutive readings before warning.
pub const REGRESSION_TOLERANCE: f64 = 0.5;

/// Threshold policy, one per data-source precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvergencePolicy {
    /// Integer sources: converged at exactly 100.
    ReachesHundred,
    /// Float sources: converged strictly above the given percent.
    Exceeds(f64),
}

impl ConvergencePolicy {
    pub const FLOAT_THRESHOLD: f64 = 99.99;

    pub const fn for_precision(precision: SyncPrecision) -> Self {
        match precision {
            SyncPrecision::Integer => Self::ReachesHundred,
            SyncPrecision::Float => Self::Exceeds(Self::FLOAT_THRESHOLD),
        }
    }

    pub fn is_met(self, percent: f64) -> bool {
        match self {
            // Percents are capped at 100 when parsed, so this is equality.
            Self::ReachesHundred => percent >= 100.0,
            Self::Exceeds(threshold) => percent > threshold,
        }
    }
}

/// Recorded once, at the transition to `Converged`.
#[derive(Debug, Clone, PartialEq)]
pub struct Convergence {
    pub elapsed: Duration,
    pub reading: ProgressReading,
    pub samples: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerState {
    NotStarted,
    Sampling {
        started_at: Instant,
        last: ProgressReading,
    },
    Converged(Convergence),
}

/// What a single observation did to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// No percent yet; still `NotStarted`.
    Waiting,
    Sampling { percent: f64 },
    Converged(Convergence),
    /// The tracker had already converged; nothing changed.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    policy: ConvergencePolicy,
    state: TrackerState,
    samples: u64,
}

impl ConvergenceTracker {
    pub const fn new(policy: ConvergencePolicy) -> Self {
        Self {
            policy,
            state: TrackerState::NotStarted,
            samples: 0,
        }
    }

    pub const fn for_precision(precision: SyncPrecision) -> Self {
        Self::new(ConvergencePolicy::for_precision(precision))
    }

    pub const fn policy(&self) -> ConvergencePolicy {
        self.policy
    }

    pub const fn state(&self) -> &TrackerState {
        &self.state
    }

    pub const fn has_started(&self) -> bool {
        !matches!(self.state, TrackerState::NotStarted)
    }

    pub const fn convergence(&self) -> Option<&Convergence> {
        match &self.state {
            TrackerState::Converged(c) => Some(c),
            _ => None,
        }
    }

    pub const fn last_reading(&self) -> Option<&ProgressReading> {
        match &self.state {
            TrackerState::NotStarted => None,
            TrackerState::Sampling { last, .. } => Some(last),
            TrackerState::Converged(c) => Some(&c.reading),
        }
    }

    /// Feed one reading taken at `at`.
    pub fn observe(&mut self, reading: ProgressReading, at: Instant) -> Observation {
        let started_at = match &self.state {
            TrackerState::Converged(_) => return Observation::Ignored,
            TrackerState::NotStarted => {
                if reading.sync_percent.is_none() {
                    return Observation::Waiting;
                }
                at
            }
            TrackerState::Sampling { started_at, last } => {
                if let (Some(prev), Some(now)) = (last.sync_percent, reading.sync_percent) {
                    if now + REGRESSION_TOLERANCE < prev {
                        warn!(previous = prev, current = now, "sync percent went backwards");
                    }
                }
                *started_at
            }
        };

        let Some(percent) = reading.sync_percent else {
            // Source stopped reporting a percent; keep the previous reading.
            warn!(block = reading.block, "reading without sync percent while sampling");
            return Observation::Sampling {
                percent: self
                    .last_reading()
                    .and_then(|r| r.sync_percent)
                    .unwrap_or_default(),
            };
        };

        self.samples += 1;

        if self.policy.is_met(percent) {
            let convergence = Convergence {
                elapsed: at.saturating_duration_since(started_at),
                reading,
                samples: self.samples,
            };
            info!(
                percent,
                elapsed_secs = convergence.elapsed.as_secs(),
                samples = convergence.samples,
                "sync converged"
            );
            self.state = TrackerState::Converged(convergence.clone());
            return Observation::Converged(convergence);
        }

        self.state = TrackerState::Sampling {
            started_at,
            last: reading,
        };
        Observation::Sampling { percent }
    }
}
