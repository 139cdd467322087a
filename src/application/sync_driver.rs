//! Sequential driver for one sync benchmark run.
//!
//! Launch the node, wait for its database directory and tip query, then (for
//! db-sync runs) launch db-sync and wait for its SQL interface. Sample the
//! measured follower until it converges, stop every process, and hand the
//! assembled report to the recorder.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::convergence_tracker::{Convergence, ConvergenceTracker, Observation};
use super::process_supervisor::{LaunchSpec, ProcessHandle, ProcessSupervisor};
use super::progress_poller::{ProgressPoller, RetryPolicy};
use super::sync_watcher::{Cadence, Companion, SyncWatcher};
use crate::domain::errors::{PollError, SupervisorError, SyncTestError, SyncTestResult};
use crate::domain::models::{
    Config, ProgressReading, RunIdentifiers, RunTimestamps, SyncReport, SyncTarget,
};
use crate::domain::ports::ProgressSource;
use crate::infrastructure::platform::collect_platform_facts;
use crate::infrastructure::probes::{
    binary_version, export_epoch_sync_times, DbSyncProgressSource, NodeTipSource, PsqlClient,
    CLI_REVISION_MARKER, DB_SYNC_REVISION_MARKER,
};
use crate::services::MetricsRecorder;

/// `start_test_time` / `end_test_time` format.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

pub fn timestamp_now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Substitute `{env}` in configured arguments and paths.
fn expand_env(template: &str, config: &Config) -> String {
    template.replace("{env}", config.environment.as_str())
}

/// Processes started during a run, stopped newest first.
#[derive(Default)]
struct Supervised {
    node: Option<ProcessHandle>,
    db_sync: Option<ProcessHandle>,
}

/// What the driver measured before the report is assembled.
struct Measurement {
    identifiers: RunIdentifiers,
    start_test_time: String,
    end_test_time: String,
    node_start: Duration,
    convergence: Convergence,
}

pub struct SyncTestRunner {
    config: Config,
    supervisor: ProcessSupervisor,
    poller: ProgressPoller,
    recorder: MetricsRecorder,
    run_id: Uuid,
}

impl SyncTestRunner {
    /// The workspace directory is made absolute so every child process gets
    /// unambiguous paths regardless of its own working directory.
    pub fn new(mut config: Config, recorder: MetricsRecorder) -> SyncTestResult<Self> {
        let workspace = std::path::absolute(config.workspace()).map_err(|source| {
            SyncTestError::Workspace {
                path: config.workspace(),
                source,
            }
        })?;
        config.workspace_dir = workspace.display().to_string();

        Ok(Self {
            supervisor: ProcessSupervisor::from_config(&config.polling),
            poller: ProgressPoller::new(),
            recorder,
            run_id: Uuid::new_v4(),
            config,
        })
    }

    #[must_use]
    pub fn with_poller(mut self, poller: ProgressPoller) -> Self {
        self.poller = poller;
        self
    }

    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline and return the persisted report.
    ///
    /// Supervised processes are stopped on every path, including errors.
    #[instrument(
        name = "sync_test",
        skip(self),
        fields(run_id = %self.run_id, env = %self.config.environment, target = ?self.config.target)
    )]
    pub async fn run(&self) -> SyncTestResult<SyncReport> {
        let platform = collect_platform_facts();
        info!(
            system = %platform.system,
            release = %platform.release,
            cpu_cores = platform.cpu_cores,
            total_ram_gb = platform.total_ram_gb,
            "platform"
        );

        let mut supervised = Supervised::default();
        let measured = self.measure(&mut supervised).await;
        self.shutdown(supervised).await;
        let measured = measured?;

        let timestamps = RunTimestamps {
            start_test_time: measured.start_test_time,
            end_test_time: measured.end_test_time,
            node_start_time_in_sec: measured.node_start.as_secs(),
            total_sync_time_in_sec: measured.convergence.elapsed.as_secs(),
        };
        let report = MetricsRecorder::assemble(
            &platform,
            &measured.identifiers,
            &timestamps,
            &measured.convergence.reading,
        );
        self.recorder.persist(&report).await?;

        if self.config.target == SyncTarget::DbSync && self.config.db_sync.export_epoch_sync_times {
            let path = self
                .config
                .db_sync_dir()
                .join(&self.config.db_sync.epoch_sync_times_file);
            if let Err(e) = export_epoch_sync_times(&PsqlClient::from_config(&self.config), &path).await {
                warn!(error = %e, "could not export epoch sync times");
            }
        }

        info!(
            total_sync_time = %report.total_sync_time_in_h_m_s,
            last_block = report.last_synced_block_no,
            "sync test finished"
        );
        Ok(report)
    }

    async fn measure(&self, supervised: &mut Supervised) -> SyncTestResult<Measurement> {
        let start_test_time = timestamp_now();
        let node_dir = self.config.node_dir();
        tokio::fs::create_dir_all(&node_dir)
            .await
            .map_err(|source| SyncTestError::Workspace {
                path: node_dir.clone(),
                source,
            })?;

        let node_version =
            binary_version(&self.config.node.cli_binary, &node_dir, CLI_REVISION_MARKER).await?;
        info!(version = %node_version.version, git_rev = %node_version.git_revision, "node cli");

        let tip_source = NodeTipSource::new(&self.config);
        let (node_start, first_tip) = self.start_node(supervised, &tip_source).await?;

        let (db_sync_version, convergence) = match self.config.target {
            SyncTarget::Node => {
                let mut tracker = ConvergenceTracker::for_precision(tip_source.precision());
                observe_first(&mut tracker, first_tip);
                let policy = RetryPolicy::cli_tip(&self.config.polling);
                let convergence = SyncWatcher::new(&self.poller, &tip_source, policy, self.cadence())
                    .run(&mut tracker)
                    .await?;
                (None, convergence)
            }
            SyncTarget::DbSync => {
                let version = binary_version(
                    &self.config.db_sync.binary,
                    &self.config.db_sync_dir(),
                    DB_SYNC_REVISION_MARKER,
                )
                .await?;
                info!(version = %version.version, git_rev = %version.git_revision, "db-sync");

                let sql_source = DbSyncProgressSource::new(PsqlClient::from_config(&self.config));
                let first_row = self.start_db_sync(supervised, &sql_source).await?;

                let mut tracker = ConvergenceTracker::for_precision(sql_source.precision());
                observe_first(&mut tracker, first_row);
                let convergence = SyncWatcher::new(
                    &self.poller,
                    &sql_source,
                    RetryPolicy::sql_progress(&self.config.polling),
                    self.cadence(),
                )
                .with_companion(Companion {
                    source: &tip_source,
                    policy: RetryPolicy::cli_tip(&self.config.polling),
                })
                .run(&mut tracker)
                .await?;
                (Some(version), convergence)
            }
        };

        Ok(Measurement {
            identifiers: RunIdentifiers {
                env: self.config.environment.to_string(),
                node_tag: self.config.node_tag.clone(),
                db_sync_branch: self.config.db_sync_branch.clone(),
                node: node_version,
                db_sync: db_sync_version,
            },
            start_test_time,
            end_test_time: timestamp_now(),
            node_start,
            convergence,
        })
    }

    /// Launch the node and wait until its tip can be queried.
    async fn start_node(
        &self,
        supervised: &mut Supervised,
        tip_source: &NodeTipSource,
    ) -> SyncTestResult<(Duration, ProgressReading)> {
        let node_dir = self.config.node_dir();
        let node_cfg = &self.config.node;
        let env = self.config.environment.as_str();
        let spec = LaunchSpec {
            name: "cardano-node".to_string(),
            program: node_cfg.binary.clone(),
            args: vec![
                "run".to_string(),
                "--topology".to_string(),
                format!("{env}-topology.json"),
                "--database-path".to_string(),
                node_dir.join("db").display().to_string(),
                "--host-addr".to_string(),
                node_cfg.host_addr.clone(),
                "--port".to_string(),
                node_cfg.port.to_string(),
                "--config".to_string(),
                format!("{env}-config.json"),
                "--socket-path".to_string(),
                node_cfg.socket_path.clone(),
            ],
            working_dir: node_dir.clone(),
            env: BTreeMap::new(),
            log_file: Config::resolve(&node_dir, &node_cfg.log_file),
        };

        let node = supervised.node.insert(self.supervisor.launch(&spec)?);

        let db_dir = node_dir.join("db");
        self.supervisor
            .await_ready(
                node,
                "node database directory",
                || db_dir.is_dir(),
                Duration::from_secs(node_cfg.db_ready_timeout_secs),
            )
            .await?;

        // Start time covers tip readiness only, measured once the database exists.
        let started = Instant::now();
        let policy = RetryPolicy::covering(
            Duration::from_secs(node_cfg.query_ready_timeout_secs),
            Duration::from_secs(self.config.polling.cli_backoff_secs),
        );
        let reading = self
            .await_query_ready(node, tip_source, &policy, started)
            .await?;

        let node_start = started.elapsed();
        info!(secs = node_start.as_secs(), tip = ?reading, "node is answering tip queries");
        Ok((node_start, reading))
    }

    /// Launch db-sync and wait until its progress query answers.
    async fn start_db_sync(
        &self,
        supervised: &mut Supervised,
        sql_source: &DbSyncProgressSource,
    ) -> SyncTestResult<ProgressReading> {
        let dir = self.config.db_sync_dir();
        let cfg = &self.config.db_sync;
        let spec = LaunchSpec {
            name: "cardano-db-sync".to_string(),
            program: cfg.binary.clone(),
            args: cfg.args.iter().map(|a| expand_env(a, &self.config)).collect(),
            working_dir: dir.clone(),
            env: cfg
                .env
                .iter()
                .map(|(k, v)| (k.clone(), expand_env(v, &self.config)))
                .collect(),
            log_file: Config::resolve(&dir, &cfg.log_file),
        };

        let started = Instant::now();
        let db_sync = supervised.db_sync.insert(self.supervisor.launch(&spec)?);

        let policy = RetryPolicy::covering(
            Duration::from_secs(cfg.ready_timeout_secs),
            Duration::from_secs(self.config.polling.sql_backoff_secs),
        );
        let reading = self
            .await_query_ready(db_sync, sql_source, &policy, started)
            .await?;
        info!(secs = started.elapsed().as_secs(), "db-sync is answering progress queries");
        Ok(reading)
    }

    /// Poll `source` until it answers; exhaustion means the process never
    /// became ready.
    async fn await_query_ready(
        &self,
        handle: &mut ProcessHandle,
        source: &dyn ProgressSource,
        policy: &RetryPolicy,
        started: Instant,
    ) -> SyncTestResult<ProgressReading> {
        match self.poller.query(source, policy).await {
            Ok(reading) => Ok(reading),
            Err(PollError::Exhausted { .. }) => {
                if let Some(status) = handle.exit_status() {
                    return Err(SupervisorError::ExitedBeforeReady {
                        name: handle.name().to_string(),
                        status: status.to_string(),
                    }
                    .into());
                }
                Err(SupervisorError::ReadinessTimeout {
                    what: format!("{} query", source.name()),
                    waited: started.elapsed(),
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn shutdown(&self, supervised: Supervised) {
        for handle in [supervised.db_sync, supervised.node].into_iter().flatten() {
            self.supervisor.terminate(handle).await;
        }
    }

    fn cadence(&self) -> Cadence {
        Cadence::from_config(&self.config.polling)
    }

    pub fn report_path(&self) -> PathBuf {
        Config::resolve(&self.config.workspace(), &self.config.results.report_file)
    }
}

/// Seed the tracker with the reading that proved the source ready.
fn observe_first(tracker: &mut ConvergenceTracker, reading: ProgressReading) {
    if let Observation::Converged(c) = tracker.observe(reading, Instant::now()) {
        info!(samples = c.samples, "already synced when first queried");
    }
}
