//! Report sinks: the JSON report file and the SQLite results store.

pub mod json_file;
pub mod sqlite;

pub use json_file::JsonFileSink;
pub use sqlite::SqliteResultsRepository;
