use async_trait::async_trait;

use crate::domain::errors::ParseError;
use crate::domain::models::{ProgressReading, SyncPrecision};

/// A probe failed to produce output (non-zero exit, spawn failure, timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub reason: String,
}

impl ProbeFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Port for a follower's progress query interface (CLI or SQL).
///
/// Implementations are side-effecting: `query` runs the external command and
/// returns its raw text, `parse` turns that text into a reading.
#[async_trait]
pub trait ProgressSource: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Precision this source reports its sync percent with
    fn precision(&self) -> SyncPrecision;

    /// Run the query once
    async fn query(&self) -> Result<String, ProbeFailure>;

    /// Parse raw query output
    fn parse(&self, raw: &str) -> Result<ProgressReading, ParseError>;
}
