//! Progress Poller
//!
//! Queries a [`ProgressSource`], parses its output and retries transient
//! failures with a fixed backoff up to an attempt ceiling.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::domain::errors::PollError;
use crate::domain::models::{PollResult, PollingConfig, ProgressReading};
use crate::domain::ports::ProgressSource;

/// Failure text marking a misconfiguration (e.g. wrong network magic).
/// Matched case-insensitively; never retried.
pub const NON_RETRYABLE_MARKER: &str = "invalid argument";

/// What happens once the attempt ceiling is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// The run cannot continue (`PollError::Fatal`).
    Abort,
    /// The caller decides (`PollError::Exhausted`).
    Propagate,
}

/// Fixed-backoff retry policy for one data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub max_attempts: u32,
    pub on_exhausted: Exhaustion,
}

impl RetryPolicy {
    pub const fn new(backoff: Duration, max_attempts: u32, on_exhausted: Exhaustion) -> Self {
        Self {
            backoff,
            max_attempts,
            on_exhausted,
        }
    }

    /// `cardano-cli query tip`: 60s backoff, fatal on exhaustion.
    pub const fn cli_tip(polling: &PollingConfig) -> Self {
        Self::new(
            Duration::from_secs(polling.cli_backoff_secs),
            polling.cli_max_attempts,
            Exhaustion::Abort,
        )
    }

    /// db-sync SQL progress: 5s backoff, exhaustion left to the caller.
    pub const fn sql_progress(polling: &PollingConfig) -> Self {
        Self::new(
            Duration::from_secs(polling.sql_backoff_secs),
            polling.sql_max_attempts,
            Exhaustion::Propagate,
        )
    }

    /// Enough attempts at `backoff` to cover `limit`, exhaustion propagated.
    /// Used to wait for a query interface to come up.
    pub fn covering(limit: Duration, backoff: Duration) -> Self {
        let backoff_secs = backoff.as_secs().max(1);
        let attempts = limit.as_secs().div_ceil(backoff_secs).max(1);
        Self::new(
            backoff,
            u32::try_from(attempts).unwrap_or(u32::MAX),
            Exhaustion::Propagate,
        )
    }
}

/// Observable record of poll attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Attempt {
        source: String,
        attempt: u32,
        result: PollResult,
    },
    /// Emitted once when a query ends on the fatal path.
    Fatal { source: String, attempts: u32 },
}

/// Issues queries against progress sources.
#[derive(Debug, Clone, Default)]
pub struct ProgressPoller {
    events: Option<mpsc::UnboundedSender<PollEvent>>,
}

impl ProgressPoller {
    pub const fn new() -> Self {
        Self { events: None }
    }

    /// Publish every attempt on `events`.
    pub const fn with_events(events: mpsc::UnboundedSender<PollEvent>) -> Self {
        Self {
            events: Some(events),
        }
    }

    /// Query `source` once and classify the outcome.
    pub async fn query_once(&self, source: &dyn ProgressSource) -> PollResult {
        match source.query().await {
            Ok(raw) => match source.parse(&raw) {
                Ok(reading) => PollResult::Ok(reading),
                Err(e) => PollResult::TransientFailure(format!("unparseable output ({e}): {raw}")),
            },
            Err(failure) => PollResult::TransientFailure(failure.reason),
        }
    }

    /// Query `source` until it answers, following `policy`.
    pub async fn query(
        &self,
        source: &dyn ProgressSource,
        policy: &RetryPolicy,
    ) -> Result<ProgressReading, PollError> {
        let name = source.name().to_string();
        let mut last_reason = String::new();

        for attempt in 1..=policy.max_attempts {
            let result = self.query_once(source).await;
            self.emit(PollEvent::Attempt {
                source: name.clone(),
                attempt,
                result: result.clone(),
            });

            match result {
                PollResult::Ok(reading) => {
                    debug!(source = %name, attempt, ?reading, "poll succeeded");
                    return Ok(reading);
                }
                PollResult::TransientFailure(reason) => {
                    if is_non_retryable(&reason) {
                        error!(source = %name, attempt, %reason, "non-retryable query error");
                        self.emit(PollEvent::Fatal {
                            source: name.clone(),
                            attempts: attempt,
                        });
                        return Err(PollError::NonRetryable {
                            source_name: name,
                            reason,
                        });
                    }

                    warn!(
                        source = %name,
                        attempt,
                        max_attempts = policy.max_attempts,
                        %reason,
                        "poll failed"
                    );
                    last_reason = reason;

                    if attempt < policy.max_attempts {
                        debug!(
                            source = %name,
                            backoff_secs = policy.backoff.as_secs(),
                            "waiting before retrying"
                        );
                        sleep(policy.backoff).await;
                    }
                }
            }
        }

        let attempts = policy.max_attempts;
        match policy.on_exhausted {
            Exhaustion::Abort => {
                error!(source = %name, attempts, reason = %last_reason, "query retries exhausted");
                self.emit(PollEvent::Fatal {
                    source: name.clone(),
                    attempts,
                });
                Err(PollError::Fatal {
                    source_name: name,
                    attempts,
                    reason: last_reason,
                })
            }
            Exhaustion::Propagate => {
                warn!(source = %name, attempts, reason = %last_reason, "query retries exhausted");
                Err(PollError::Exhausted {
                    source_name: name,
                    attempts,
                    reason: last_reason,
                })
            }
        }
    }

    fn emit(&self, event: PollEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone means nobody is watching.
            let _ = tx.send(event);
        }
    }
}

pub fn is_non_retryable(reason: &str) -> bool {
    reason.to_lowercase().contains(NON_RETRYABLE_MARKER)
}
