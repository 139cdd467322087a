//! One-shot external commands: version probes, `query tip`, `psql`.

pub mod command;

pub use command::{resolve_program, run_command, CommandSpec};
