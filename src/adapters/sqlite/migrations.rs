//! Schema versions for the results store.
//!
//! Each entry of [`SCHEMA`] is applied at most once. The SQL and the row in
//! `schema_migrations` that records it commit in the same transaction.

use std::collections::BTreeSet;

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Cannot read or create schema_migrations: {0}")]
    Bookkeeping(#[source] sqlx::Error),

    #[error("Schema version {version} ({description}) failed: {source}")]
    Apply {
        version: i64,
        description: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaVersion {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Every schema version, oldest first.
pub const SCHEMA: &[SchemaVersion] = &[SchemaVersion {
    version: 1,
    description: "sync_runs table",
    sql: include_str!("../../../migrations/001_sync_runs.sql"),
}];

/// Brings a results database up to the newest [`SchemaVersion`].
pub struct SchemaMigrator<'a> {
    pool: &'a SqlitePool,
    versions: &'a [SchemaVersion],
}

impl<'a> SchemaMigrator<'a> {
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self::with_versions(pool, SCHEMA)
    }

    pub const fn with_versions(pool: &'a SqlitePool, versions: &'a [SchemaVersion]) -> Self {
        Self { pool, versions }
    }

    /// Versions already recorded in `schema_migrations`.
    pub async fn applied(&self) -> Result<BTreeSet<i64>, MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(self.pool)
        .await
        .map_err(MigrationError::Bookkeeping)?;

        let rows: Vec<(i64,)> = sqlx::query_as("SELECT version FROM schema_migrations")
            .fetch_all(self.pool)
            .await
            .map_err(MigrationError::Bookkeeping)?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    /// Apply the versions not yet recorded and return them.
    pub async fn migrate(&self) -> Result<Vec<i64>, MigrationError> {
        let applied = self.applied().await?;
        let mut newly_applied = Vec::new();

        for schema in self.versions.iter().filter(|s| !applied.contains(&s.version)) {
            let failed = |source| MigrationError::Apply {
                version: schema.version,
                description: schema.description,
                source,
            };

            let mut tx = self.pool.begin().await.map_err(failed)?;
            sqlx::raw_sql(schema.sql).execute(&mut *tx).await.map_err(failed)?;
            sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
                .bind(schema.version)
                .bind(schema.description)
                .execute(&mut *tx)
                .await
                .map_err(failed)?;
            tx.commit().await.map_err(failed)?;

            info!(version = schema.version, description = schema.description, "schema upgraded");
            newly_applied.push(schema.version);
        }

        Ok(newly_applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_test_pool;

    #[tokio::test]
    async fn test_schema_applies_once() {
        let pool = create_test_pool().await.unwrap();
        let migrator = SchemaMigrator::new(&pool);

        assert_eq!(migrator.migrate().await.unwrap(), vec![1]);
        assert!(migrator.migrate().await.unwrap().is_empty());
        assert_eq!(migrator.applied().await.unwrap(), BTreeSet::from([1]));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_runs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_failed_version_is_not_recorded() {
        let pool = create_test_pool().await.unwrap();
        let broken = [SchemaVersion {
            version: 7,
            description: "broken",
            sql: "CREATE TABLE oops (",
        }];

        let err = SchemaMigrator::with_versions(&pool, &broken)
            .migrate()
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::Apply { version: 7, .. }));
        assert!(SchemaMigrator::new(&pool).applied().await.unwrap().is_empty());
    }
}
