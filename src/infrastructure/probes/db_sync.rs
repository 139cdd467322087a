use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::domain::errors::{ParseError, PersistenceError, SyncTestError};
use crate::domain::models::{parse_db_sync_row, Config, ProgressReading, SyncPrecision};
use crate::domain::ports::{ProbeFailure, ProgressSource};
use crate::infrastructure::process::{run_command, CommandSpec};

/// Percent of wall-clock time covered by indexed blocks, joined with the
/// latest block row.
pub const PROGRESS_QUERY: &str = "select p.sync_percent, b.epoch_no, b.block_no, \
encode(b.hash, 'hex'), b.slot_no from (select 100 * (extract(epoch from (max(time) at time zone 'UTC')) \
- extract(epoch from (min(time) at time zone 'UTC'))) / (extract(epoch from (now() at time zone 'UTC')) \
- extract(epoch from (min(time) at time zone 'UTC'))) as sync_percent from block) p, \
(select epoch_no, block_no, hash, slot_no from block order by id desc limit 1) b;";

pub const EPOCH_SYNC_TIMES_QUERY: &str =
    "SELECT array_to_json(array_agg(epoch_sync_time), FALSE) FROM epoch_sync_time;";

/// Runs SQL through `psql` in tuples-only mode.
#[derive(Debug, Clone)]
pub struct PsqlClient {
    binary: String,
    working_dir: PathBuf,
    host: String,
    port: u16,
    user: String,
    database: String,
    timeout: Duration,
}

impl PsqlClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            binary: config.postgres.psql_binary.clone(),
            working_dir: config.db_sync_dir(),
            host: config.postgres.host.clone(),
            port: config.postgres.port,
            user: config.postgres.user.clone(),
            database: config.postgres_database(),
            timeout: Duration::from_secs(config.postgres.query_timeout_secs),
        }
    }

    pub fn command(&self, sql: &str) -> CommandSpec {
        CommandSpec::new(&self.binary, &self.working_dir)
            .args(["-P", "pager=off", "-qt", "-U", &self.user, "-d", &self.database, "-c", sql])
            .env("PGHOST", &self.host)
            .env("PGPORT", self.port.to_string())
            .env("PGUSER", &self.user)
            .timeout(self.timeout)
    }

    pub async fn query(&self, sql: &str) -> Result<String, ProbeFailure> {
        run_command(&self.command(sql)).await
    }
}

/// db-sync progress from its `block` table. Float precision.
#[derive(Debug, Clone)]
pub struct DbSyncProgressSource {
    psql: PsqlClient,
}

impl DbSyncProgressSource {
    pub const fn new(psql: PsqlClient) -> Self {
        Self { psql }
    }
}

#[async_trait]
impl ProgressSource for DbSyncProgressSource {
    fn name(&self) -> &str {
        "db-sync"
    }

    fn precision(&self) -> SyncPrecision {
        SyncPrecision::Float
    }

    async fn query(&self) -> Result<String, ProbeFailure> {
        self.psql.query(PROGRESS_QUERY).await
    }

    fn parse(&self, raw: &str) -> Result<ProgressReading, ParseError> {
        let (percent, tip) = parse_db_sync_row(raw)?;
        Ok(ProgressReading::from_db_sync(tip, percent))
    }
}

/// Dump per-epoch sync times to `path` as a JSON array.
pub async fn export_epoch_sync_times(
    psql: &PsqlClient,
    path: &Path,
) -> Result<PathBuf, SyncTestError> {
    let output = psql
        .query(EPOCH_SYNC_TIMES_QUERY)
        .await
        .map_err(|failure| SyncTestError::Command {
            command: "export epoch sync times".to_string(),
            output: failure.reason,
        })?;

    // An empty table aggregates to NULL, which psql prints as nothing.
    let body = if output.trim().is_empty() {
        "[]".to_string()
    } else {
        output.trim().to_string()
    };
    tokio::fs::write(path, body)
        .await
        .map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    info!(path = %path.display(), "exported epoch sync times");
    Ok(path.to_path_buf())
}
