//! Progress sources and one-shot probes backed by external commands.

pub mod db_sync;
pub mod node_tip;
pub mod version;

pub use db_sync::{export_epoch_sync_times, DbSyncProgressSource, PsqlClient};
pub use node_tip::NodeTipSource;
pub use version::{binary_version, CLI_REVISION_MARKER, DB_SYNC_REVISION_MARKER};
