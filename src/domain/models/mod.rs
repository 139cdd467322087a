pub mod config;
pub mod network;
pub mod progress;
pub mod report;

pub use config::{
    Config, DbSyncConfig, LoggingConfig, NodeConfig, PollingConfig, PostgresConfig,
    ResultsConfig, SyncTarget,
};
pub use network::Network;
pub use progress::{
    parse_db_sync_row, parse_version_output, DbSyncTip, PollResult,
    ProgressReading, SyncPrecision,
};
pub use report::{
    seconds_to_time, PlatformFacts, RunIdentifiers, RunTimestamps, SyncReport, VersionInfo,
};
