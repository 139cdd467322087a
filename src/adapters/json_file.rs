//! Report file sink (`test_results.json`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::domain::errors::PersistenceError;
use crate::domain::models::SyncReport;
use crate::domain::ports::ReportSink;

#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a report written by [`JsonFileSink::persist`].
    pub async fn read(path: &Path) -> Result<SyncReport, PersistenceError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl ReportSink for JsonFileSink {
    fn name(&self) -> &str {
        "report-file"
    }

    async fn persist(&self, report: &SyncReport) -> Result<(), PersistenceError> {
        let body = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|source| PersistenceError::Io {
                path: self.path.clone(),
                source,
            })?;
        info!(path = %self.path.display(), "wrote sync report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::seconds_to_time;

    fn report() -> SyncReport {
        SyncReport {
            platform_system: "Linux".to_string(),
            platform_release: "6.1.0".to_string(),
            platform_version: "#1 SMP".to_string(),
            no_of_cpu_cores: 8,
            total_ram_in_gb: 32,
            env: "staging".to_string(),
            node_tag: Some("8.1.2".to_string()),
            db_sync_branch: None,
            node_cli_version: "cardano-cli 8.1.2".to_string(),
            node_git_revision: "d2d90b48".to_string(),
            db_sync_version: None,
            db_sync_git_rev: None,
            start_test_time: "01/02/2024 10:00:00".to_string(),
            end_test_time: "01/02/2024 12:00:00".to_string(),
            node_start_time_in_sec: 14,
            total_sync_time_in_sec: 7200,
            total_sync_time_in_h_m_s: seconds_to_time(7200),
            last_synced_epoch_no: Some(412),
            last_synced_block_no: 9_000_000,
        }
    }

    #[tokio::test]
    async fn test_persist_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("test_results.json"));

        sink.persist(&report()).await.unwrap();
        assert_eq!(JsonFileSink::read(sink.path()).await.unwrap(), report());
    }

    #[tokio::test]
    async fn test_field_order_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("test_results.json"));
        sink.persist(&report()).await.unwrap();

        let raw = std::fs::read_to_string(sink.path()).unwrap();
        let first = raw.find("\"platform_system\"").unwrap();
        let env = raw.find("\"env\"").unwrap();
        let last = raw.find("\"last_synced_block_no\"").unwrap();
        assert!(first < env && env < last);
    }

    #[tokio::test]
    async fn test_unreachable_sink_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("missing").join("test_results.json"));

        let err = sink.persist(&report()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
    }
}
