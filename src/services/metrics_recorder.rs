//! Metrics Recorder
//!
//! Aggregates platform facts, identifiers and timings into the run's
//! [`SyncReport`] and hands it to every configured sink.

use std::sync::Arc;

use tracing::{error, info};

use crate::domain::errors::PersistenceError;
use crate::domain::models::{
    seconds_to_time, PlatformFacts, ProgressReading, RunIdentifiers, RunTimestamps, SyncReport,
};
use crate::domain::ports::ReportSink;

#[derive(Clone, Default)]
pub struct MetricsRecorder {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl MetricsRecorder {
    pub fn new(sinks: Vec<Arc<dyn ReportSink>>) -> Self {
        Self { sinks }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Build the report. Pure; `final_reading` supplies the last synced
    /// epoch and block.
    pub fn assemble(
        platform: &PlatformFacts,
        identifiers: &RunIdentifiers,
        timestamps: &RunTimestamps,
        final_reading: &ProgressReading,
    ) -> SyncReport {
        let (db_sync_version, db_sync_git_rev) = identifiers
            .db_sync
            .as_ref()
            .map_or((None, None), |v| {
                (Some(v.version.clone()), Some(v.git_revision.clone()))
            });

        SyncReport {
            platform_system: platform.system.clone(),
            platform_release: platform.release.clone(),
            platform_version: platform.version.clone(),
            no_of_cpu_cores: platform.cpu_cores,
            total_ram_in_gb: platform.total_ram_gb,
            env: identifiers.env.clone(),
            node_tag: identifiers.node_tag.clone(),
            db_sync_branch: identifiers.db_sync_branch.clone(),
            node_cli_version: identifiers.node.version.clone(),
            node_git_revision: identifiers.node.git_revision.clone(),
            db_sync_version,
            db_sync_git_rev,
            start_test_time: timestamps.start_test_time.clone(),
            end_test_time: timestamps.end_test_time.clone(),
            node_start_time_in_sec: timestamps.node_start_time_in_sec,
            total_sync_time_in_sec: timestamps.total_sync_time_in_sec,
            total_sync_time_in_h_m_s: seconds_to_time(timestamps.total_sync_time_in_sec),
            last_synced_epoch_no: final_reading.epoch,
            last_synced_block_no: final_reading.block,
        }
    }

    /// Write `report` to every sink in order. The first failure is returned.
    pub async fn persist(&self, report: &SyncReport) -> Result<(), PersistenceError> {
        for sink in &self.sinks {
            if let Err(e) = sink.persist(report).await {
                error!(sink = sink.name(), error = %e, "failed to persist sync report");
                return Err(e);
            }
            info!(sink = sink.name(), "sync report persisted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::VersionInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn platform() -> PlatformFacts {
        PlatformFacts {
            system: "Linux".to_string(),
            release: "6.1.0".to_string(),
            version: "#1 SMP".to_string(),
            cpu_cores: 16,
            total_ram_gb: 64,
        }
    }

    fn identifiers(db_sync: bool) -> RunIdentifiers {
        RunIdentifiers {
            env: "testnet".to_string(),
            node_tag: Some("8.1.2".to_string()),
            db_sync_branch: db_sync.then(|| "release/13.1".to_string()),
            node: VersionInfo {
                version: "cardano-cli 8.1.2".to_string(),
                git_revision: "abc".to_string(),
            },
            db_sync: db_sync.then(|| VersionInfo {
                version: "cardano-db-sync 13.1.0.0".to_string(),
                git_revision: "def".to_string(),
            }),
        }
    }

    fn timestamps() -> RunTimestamps {
        RunTimestamps {
            start_test_time: "01/02/2024 10:00:00".to_string(),
            end_test_time: "02/02/2024 11:01:01".to_string(),
            node_start_time_in_sec: 12,
            total_sync_time_in_sec: 90_061,
        }
    }

    fn reading() -> ProgressReading {
        ProgressReading {
            epoch: Some(412),
            block: 9_100_000,
            hash: "ff".to_string(),
            slot: 110_000_000,
            era: "babbage".to_string(),
            sync_percent: Some(100.0),
        }
    }

    #[test]
    fn test_assemble_db_sync_run() {
        let report =
            MetricsRecorder::assemble(&platform(), &identifiers(true), &timestamps(), &reading());

        assert_eq!(report.no_of_cpu_cores, 16);
        assert_eq!(report.db_sync_version.as_deref(), Some("cardano-db-sync 13.1.0.0"));
        assert_eq!(report.db_sync_git_rev.as_deref(), Some("def"));
        assert_eq!(report.total_sync_time_in_h_m_s, "1 day, 1:01:01");
        assert_eq!(report.last_synced_epoch_no, Some(412));
        assert_eq!(report.last_synced_block_no, 9_100_000);
    }

    #[test]
    fn test_assemble_node_run_has_no_db_sync_fields() {
        let report =
            MetricsRecorder::assemble(&platform(), &identifiers(false), &timestamps(), &reading());
        assert!(report.db_sync_version.is_none());
        assert!(report.db_sync_git_rev.is_none());
        assert!(report.db_sync_branch.is_none());
    }

    struct RecordingSink {
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn persist(&self, report: &SyncReport) -> Result<(), PersistenceError> {
            if self.fail {
                return Err(PersistenceError::Database("unreachable".to_string()));
            }
            self.seen.lock().unwrap().push(report.env.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_persist_surfaces_sink_failure() {
        let failing = Arc::new(RecordingSink {
            fail: true,
            seen: Mutex::new(Vec::new()),
        });
        let after = Arc::new(RecordingSink {
            fail: false,
            seen: Mutex::new(Vec::new()),
        });
        let recorder = MetricsRecorder::default()
            .with_sink(failing)
            .with_sink(after.clone());

        let report =
            MetricsRecorder::assemble(&platform(), &identifiers(false), &timestamps(), &reading());
        let err = recorder.persist(&report).await.unwrap_err();

        assert!(matches!(err, PersistenceError::Database(_)));
        assert!(after.seen.lock().unwrap().is_empty());
    }
}
