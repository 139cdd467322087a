//! Domain errors for the sync benchmark.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while starting, readying or watching a supervised process.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open log sink {path}: {source}")]
    LogSink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} was not ready after {}s", .waited.as_secs())]
    ReadinessTimeout { what: String, waited: Duration },

    #[error("{name} exited before becoming ready ({status})")]
    ExitedBeforeReady { name: String, status: String },
}

/// Errors raised by the progress poller.
#[derive(Debug, Error)]
pub enum PollError {
    /// The query failed with a marker that signals misconfiguration.
    #[error("{source_name} query failed with a non-retryable error: {reason}")]
    NonRetryable { source_name: String, reason: String },

    /// The attempt ceiling was exceeded on a source whose exhaustion aborts the run.
    #[error("{source_name} query failed {attempts} times, aborting: {reason}")]
    Fatal {
        source_name: String,
        attempts: u32,
        reason: String,
    },

    /// The attempt ceiling was exceeded on a source whose exhaustion is left to the caller.
    #[error("{source_name} query failed {attempts} times: {reason}")]
    Exhausted {
        source_name: String,
        attempts: u32,
        reason: String,
    },
}

impl PollError {
    /// Whether this error must halt the run regardless of the caller.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::NonRetryable { .. } | Self::Fatal { .. })
    }
}

/// Errors produced while turning raw probe output into typed values.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} is not a number: {value}")]
    NotANumber { field: &'static str, value: String },

    #[error("Unexpected row shape: {0:?}")]
    UnexpectedRow(String),

    #[error("Version output has no `{marker}` marker: {output:?}")]
    MissingVersionMarker { marker: &'static str, output: String },
}

/// Errors raised when a report cannot be written to its sink.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Results store error: {0}")]
    Database(String),

    #[error("Run {0} is already recorded")]
    DuplicateIdentifier(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Top-level error for a sync test run.
#[derive(Debug, Error)]
pub enum SyncTestError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Command `{command}` failed: {output}")]
    Command { command: String, output: String },

    #[error("Workspace error at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type SyncTestResult<T> = Result<T, SyncTestError>;
