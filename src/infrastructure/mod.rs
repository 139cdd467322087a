//! Infrastructure layer module
//!
//! External integrations behind the domain ports:
//! - One-shot commands (`cardano-cli`, `psql`, `--version` probes)
//! - Progress sources for the node tip and db-sync
//! - Platform facts
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod logging;
pub mod platform;
pub mod probes;
pub mod process;
