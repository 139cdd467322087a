//! Syncbench - sync benchmark supervisor
//!
//! Starts a `cardano-node` (and optionally `cardano-db-sync`), polls its
//! progress through the CLI or SQL until it is fully synced, and records
//! the timings as a report.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and ports
//! - **Application Layer** (`application`): supervisor, poller, tracker and the run driver
//! - **Service Layer** (`services`): report assembly and persistence
//! - **Adapters** (`adapters`): report file and SQLite results store
//! - **Infrastructure Layer** (`infrastructure`): external commands, config, logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{
    ConvergenceTracker, ProcessSupervisor, ProgressPoller, RetryPolicy, SyncTestRunner,
};
pub use domain::errors::{SyncTestError, SyncTestResult};
pub use domain::models::{Config, Network, ProgressReading, SyncReport, SyncTarget};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::MetricsRecorder;
