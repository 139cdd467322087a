//! Tabular results store: one `sync_runs` row per published report.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::domain::errors::PersistenceError;
use crate::domain::models::SyncReport;
use crate::domain::ports::ReportSink;

#[derive(Clone)]
pub struct SqliteResultsRepository {
    pool: SqlitePool,
}

impl SqliteResultsRepository {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Next free identifier for `env`: `<env>_<n+1>`, n being the highest run
    /// number already stored (0 when none).
    pub async fn next_identifier(&self, env: &str) -> Result<(String, i64), PersistenceError> {
        let (max,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(run_number), 0) FROM sync_runs WHERE env = ?")
                .bind(env)
                .fetch_one(&self.pool)
                .await?;
        let next = max + 1;
        Ok((format!("{env}_{next}"), next))
    }

    pub async fn insert(
        &self,
        identifier: &str,
        run_number: i64,
        report: &SyncReport,
    ) -> Result<(), PersistenceError> {
        let result = sqlx::query(
            r"INSERT INTO sync_runs (
                identifier, env, run_number, platform_system, platform_release, platform_version,
                no_of_cpu_cores, total_ram_in_gb, node_tag, db_sync_branch, node_cli_version,
                node_git_revision, db_sync_version, db_sync_git_rev, start_test_time, end_test_time,
                node_start_time_in_sec, total_sync_time_in_sec, total_sync_time_in_h_m_s,
                last_synced_epoch_no, last_synced_block_no
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(identifier)
        .bind(&report.env)
        .bind(run_number)
        .bind(&report.platform_system)
        .bind(&report.platform_release)
        .bind(&report.platform_version)
        .bind(i64::try_from(report.no_of_cpu_cores).unwrap_or(i64::MAX))
        .bind(to_i64(report.total_ram_in_gb))
        .bind(&report.node_tag)
        .bind(&report.db_sync_branch)
        .bind(&report.node_cli_version)
        .bind(&report.node_git_revision)
        .bind(&report.db_sync_version)
        .bind(&report.db_sync_git_rev)
        .bind(&report.start_test_time)
        .bind(&report.end_test_time)
        .bind(to_i64(report.node_start_time_in_sec))
        .bind(to_i64(report.total_sync_time_in_sec))
        .bind(&report.total_sync_time_in_h_m_s)
        .bind(report.last_synced_epoch_no.map(to_i64))
        .bind(to_i64(report.last_synced_block_no))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(PersistenceError::DuplicateIdentifier(identifier.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Store `report` under the next identifier for its environment.
    pub async fn publish(&self, report: &SyncReport) -> Result<String, PersistenceError> {
        let (identifier, run_number) = self.next_identifier(&report.env).await?;
        self.insert(&identifier, run_number, report).await?;
        info!(%identifier, "published sync run");
        Ok(identifier)
    }

    pub async fn find(&self, identifier: &str) -> Result<Option<SyncReport>, PersistenceError> {
        let row = sqlx::query("SELECT * FROM sync_runs WHERE identifier = ?")
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_report).transpose()
    }
}

#[async_trait]
impl ReportSink for SqliteResultsRepository {
    fn name(&self) -> &str {
        "results-store"
    }

    async fn persist(&self, report: &SyncReport) -> Result<(), PersistenceError> {
        self.publish(report).await.map(|_| ())
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn row_to_report(row: &SqliteRow) -> Result<SyncReport, PersistenceError> {
    Ok(SyncReport {
        platform_system: row.try_get("platform_system")?,
        platform_release: row.try_get("platform_release")?,
        platform_version: row.try_get("platform_version")?,
        no_of_cpu_cores: usize::try_from(row.try_get::<i64, _>("no_of_cpu_cores")?).unwrap_or_default(),
        total_ram_in_gb: to_u64(row.try_get("total_ram_in_gb")?),
        env: row.try_get("env")?,
        node_tag: row.try_get("node_tag")?,
        db_sync_branch: row.try_get("db_sync_branch")?,
        node_cli_version: row.try_get("node_cli_version")?,
        node_git_revision: row.try_get("node_git_revision")?,
        db_sync_version: row.try_get("db_sync_version")?,
        db_sync_git_rev: row.try_get("db_sync_git_rev")?,
        start_test_time: row.try_get("start_test_time")?,
        end_test_time: row.try_get("end_test_time")?,
        node_start_time_in_sec: to_u64(row.try_get("node_start_time_in_sec")?),
        total_sync_time_in_sec: to_u64(row.try_get("total_sync_time_in_sec")?),
        total_sync_time_in_h_m_s: row.try_get("total_sync_time_in_h_m_s")?,
        last_synced_epoch_no: row.try_get::<Option<i64>, _>("last_synced_epoch_no")?.map(to_u64),
        last_synced_block_no: to_u64(row.try_get("last_synced_block_no")?),
    })
}
