//! SQLite results store.

pub mod connection;
pub mod migrations;
pub mod results_repository;

pub use connection::{create_pool, create_test_pool, database_url, ConnectionError, PoolConfig};
pub use migrations::{MigrationError, SchemaMigrator, SchemaVersion, SCHEMA};
pub use results_repository::SqliteResultsRepository;

use sqlx::SqlitePool;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

impl From<DatabaseError> for crate::domain::errors::PersistenceError {
    fn from(err: DatabaseError) -> Self {
        Self::Database(err.to_string())
    }
}

pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(database_url, None).await?;
    SchemaMigrator::new(&pool).migrate().await?;
    Ok(pool)
}

/// Open (creating if needed) the results database at `path`.
pub async fn open_results_store(path: &Path) -> Result<SqliteResultsRepository, DatabaseError> {
    let pool = initialize_database(&database_url(path)).await?;
    Ok(SqliteResultsRepository::new(pool))
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    SchemaMigrator::new(&pool).migrate().await?;
    Ok(pool)
}
