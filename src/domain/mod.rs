//! Domain layer for the sync benchmark
//!
//! Readings, reports, configuration and the ports the application layer
//! drives. Nothing here spawns processes or touches the network.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    ParseError, PersistenceError, PollError, SupervisorError, SyncTestError, SyncTestResult,
};
