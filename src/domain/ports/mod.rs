//! Port trait definitions (Hexagonal Architecture)
//!
//! - ProgressSource: a follower's query interface (node CLI, db-sync SQL)
//! - ReportSink: a destination for the final report (file, results store)

pub mod progress_source;
pub mod report_sink;

pub use progress_source::{ProbeFailure, ProgressSource};
pub use report_sink::ReportSink;
