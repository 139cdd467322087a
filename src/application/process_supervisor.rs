//! Process Supervisor
//!
//! Starts the long-running follower processes (node, db-sync), waits for their
//! readiness signal and stops them again. Every lifecycle operation is keyed
//! off the handle returned by [`ProcessSupervisor::launch`]; processes are never
//! looked up by name.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout, Instant};
use tracing::{error, info, warn};

use crate::domain::errors::SupervisorError;
use crate::domain::models::PollingConfig;
use crate::infrastructure::process::resolve_program;

/// Everything needed to start one supervised process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: BTreeMap<String, String>,
    /// stdout and stderr are both written here (truncated on launch)
    pub log_file: PathBuf,
}

/// Exclusive ownership of a running process.
#[derive(Debug)]
pub struct ProcessHandle {
    name: String,
    pid: Option<u32>,
    child: Child,
}

impl ProcessHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status if the process has already exited.
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        match self.child.try_wait() {
            Ok(status) => status,
            Err(e) => {
                warn!(name = %self.name, pid = ?self.pid, error = %e, "cannot poll process status, assuming alive");
                None
            }
        }
    }

    pub fn is_alive(&mut self) -> bool {
        self.exit_status().is_none()
    }
}

/// Result of a termination sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    Exited(ExitStatus),
    /// The process outlived SIGTERM, SIGKILL and the grace period.
    Lingering { pid: Option<u32> },
}

/// Starts, readies and stops supervised processes.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    readiness_interval: Duration,
    termination_grace: Duration,
}

impl ProcessSupervisor {
    pub const fn new(readiness_interval: Duration, termination_grace: Duration) -> Self {
        Self {
            readiness_interval,
            termination_grace,
        }
    }

    pub const fn from_config(polling: &PollingConfig) -> Self {
        Self::new(
            Duration::from_secs(polling.readiness_interval_secs),
            polling.termination_grace(),
        )
    }

    /// Spawn the process described by `spec`, sending its output to the log sink.
    pub fn launch(&self, spec: &LaunchSpec) -> Result<ProcessHandle, SupervisorError> {
        let log = File::create(&spec.log_file).map_err(|source| SupervisorError::LogSink {
            path: spec.log_file.clone(),
            source,
        })?;
        let log_err = log.try_clone().map_err(|source| SupervisorError::LogSink {
            path: spec.log_file.clone(),
            source,
        })?;

        let program = resolve_program(&spec.working_dir, &spec.program);
        info!(
            name = %spec.name,
            program = %program.display(),
            args = ?spec.args,
            cwd = %spec.working_dir.display(),
            log_file = %spec.log_file.display(),
            "launching process"
        );

        let child = Command::new(&program)
            .args(&spec.args)
            .envs(&spec.env)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Launch {
                program: program.display().to_string(),
                source,
            })?;

        let pid = child.id();
        info!(name = %spec.name, pid = ?pid, "process started");

        Ok(ProcessHandle {
            name: spec.name.clone(),
            pid,
            child,
        })
    }

    /// Poll `predicate` once per readiness interval until it holds.
    ///
    /// Fails with `ReadinessTimeout` after `limit`, or `ExitedBeforeReady` if the
    /// process dies first. Returns the time it took to become ready.
    pub async fn await_ready<F>(
        &self,
        handle: &mut ProcessHandle,
        what: &str,
        predicate: F,
        limit: Duration,
    ) -> Result<Duration, SupervisorError>
    where
        F: FnMut() -> bool,
    {
        let name = handle.name.clone();
        let waited = poll_until(
            predicate,
            || handle.exit_status().map(|s| s.to_string()),
            self.readiness_interval,
            limit,
        )
        .await;

        match waited {
            Ok(elapsed) => {
                info!(name = %name, what, secs = elapsed.as_secs(), "process ready");
                Ok(elapsed)
            }
            Err(ReadyFailure::Exited(status)) => {
                error!(name = %name, %status, "process exited before becoming ready");
                Err(SupervisorError::ExitedBeforeReady { name, status })
            }
            Err(ReadyFailure::TimedOut(waited)) => {
                error!(name = %name, what, secs = waited.as_secs(), "readiness timeout");
                Err(SupervisorError::ReadinessTimeout {
                    what: what.to_string(),
                    waited,
                })
            }
        }
    }

    /// SIGTERM, then SIGKILL, then report whether the process is gone.
    ///
    /// Best effort: a process that survives is logged and reported as
    /// `Lingering`, never returned as an error.
    pub async fn terminate(&self, mut handle: ProcessHandle) -> TerminationOutcome {
        info!(name = %handle.name, pid = ?handle.pid, "stopping process");

        if let Some(status) = handle.exit_status() {
            info!(name = %handle.name, %status, "process had already exited");
            return TerminationOutcome::Exited(status);
        }

        match handle.pid.and_then(|pid| i32::try_from(pid).ok()) {
            Some(raw) => {
                if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
                    warn!(name = %handle.name, error = %e, "failed to send SIGTERM");
                }
            }
            None => warn!(name = %handle.name, "no pid recorded, skipping SIGTERM"),
        }

        match timeout(self.termination_grace, handle.child.wait()).await {
            Ok(Ok(status)) => {
                info!(name = %handle.name, %status, "process exited");
                return TerminationOutcome::Exited(status);
            }
            Ok(Err(e)) => warn!(name = %handle.name, error = %e, "error waiting for process to exit"),
            Err(_) => warn!(
                name = %handle.name,
                grace_secs = self.termination_grace.as_secs(),
                "process ignored SIGTERM, forcing kill"
            ),
        }

        if let Err(e) = handle.child.start_kill() {
            warn!(name = %handle.name, error = %e, "failed to send SIGKILL");
        }

        match timeout(self.termination_grace, handle.child.wait()).await {
            Ok(Ok(status)) => {
                info!(name = %handle.name, %status, "process killed");
                TerminationOutcome::Exited(status)
            }
            _ => {
                warn!(
                    name = %handle.name,
                    pid = ?handle.pid,
                    "process is still alive after termination"
                );
                TerminationOutcome::Lingering { pid: handle.pid }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReadyFailure {
    Exited(String),
    TimedOut(Duration),
}

/// Readiness loop shared by [`ProcessSupervisor::await_ready`].
///
/// The predicate is checked before the deadline, so a signal that appears on
/// the last tick still counts.
pub(crate) async fn poll_until<F, E>(
    mut predicate: F,
    mut exited: E,
    interval: Duration,
    limit: Duration,
) -> Result<Duration, ReadyFailure>
where
    F: FnMut() -> bool,
    E: FnMut() -> Option<String>,
{
    let start = Instant::now();
    loop {
        if predicate() {
            return Ok(start.elapsed());
        }
        if let Some(status) = exited() {
            return Err(ReadyFailure::Exited(status));
        }
        let elapsed = start.elapsed();
        if elapsed >= limit {
            return Err(ReadyFailure::TimedOut(elapsed));
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn shell_spec(dir: &TempDir, name: &str, script: &str) -> LaunchSpec {
        LaunchSpec {
            name: name.to_string(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            working_dir: dir.path().to_path_buf(),
            env: BTreeMap::new(),
            log_file: dir.path().join(format!("{name}.log")),
        }
    }

    fn supervisor() -> ProcessSupervisor {
        ProcessSupervisor::new(Duration::from_millis(50), Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_timeout_with_fake_clock() {
        let result = poll_until(
            || false,
            || None,
            Duration::from_secs(1),
            Duration::from_secs(300),
        )
        .await;

        assert_eq!(result, Err(ReadyFailure::TimedOut(Duration::from_secs(300))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_counts_elapsed_ticks() {
        let checks = Cell::new(0u32);
        let result = poll_until(
            || {
                checks.set(checks.get() + 1);
                checks.get() > 42
            },
            || None,
            Duration::from_secs(1),
            Duration::from_secs(300),
        )
        .await;

        assert_eq!(result, Ok(Duration::from_secs(42)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_reports_early_exit() {
        let result = poll_until(
            || false,
            || Some("exit status: 1".to_string()),
            Duration::from_secs(1),
            Duration::from_secs(300),
        )
        .await;

        assert_eq!(result, Err(ReadyFailure::Exited("exit status: 1".to_string())));
    }

    #[tokio::test]
    async fn test_launch_missing_binary() {
        let dir = TempDir::new().unwrap();
        let spec = LaunchSpec {
            program: "./does-not-exist".to_string(),
            ..shell_spec(&dir, "ghost", "")
        };

        let err = supervisor().launch(&spec).unwrap_err();
        assert!(matches!(err, SupervisorError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_launch_writes_log_sink() {
        let dir = TempDir::new().unwrap();
        let spec = shell_spec(&dir, "echoer", "echo started; echo oops >&2");
        let mut handle = supervisor().launch(&spec).unwrap();
        assert!(handle.pid().is_some());

        handle.child.wait().await.unwrap();
        let log = std::fs::read_to_string(&spec.log_file).unwrap();
        assert!(log.contains("started"));
        assert!(log.contains("oops"));
    }

    #[tokio::test]
    async fn test_await_ready_on_directory() {
        let dir = TempDir::new().unwrap();
        let spec = shell_spec(&dir, "node", "sleep 0.2; mkdir db; exec sleep 30");
        let sup = supervisor();
        let mut handle = sup.launch(&spec).unwrap();

        let db_dir = dir.path().join("db");
        let elapsed = sup
            .await_ready(&mut handle, "db directory", || db_dir.is_dir(), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(elapsed < Duration::from_secs(10));

        let outcome = sup.terminate(handle).await;
        assert!(matches!(outcome, TerminationOutcome::Exited(_)));
    }

    #[tokio::test]
    async fn test_await_ready_process_died() {
        let dir = TempDir::new().unwrap();
        let spec = shell_spec(&dir, "crasher", "exit 3");
        let sup = supervisor();
        let mut handle = sup.launch(&spec).unwrap();

        let err = sup
            .await_ready(&mut handle, "db directory", || false, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::ExitedBeforeReady { .. }));
    }

    #[tokio::test]
    async fn test_unpollable_status_is_treated_as_alive() {
        let dir = TempDir::new().unwrap();
        let spec = shell_spec(&dir, "reaped", "exit 0");
        let mut handle = supervisor().launch(&spec).unwrap();
        let pid = Pid::from_raw(i32::try_from(handle.pid().unwrap()).unwrap());

        // Reap behind tokio's back so its own wait fails with ECHILD.
        nix::sys::wait::waitpid(pid, None).unwrap();

        assert_eq!(handle.exit_status(), None);
        assert!(handle.is_alive());
    }

    #[tokio::test]
    async fn test_terminate_graceful() {
        let dir = TempDir::new().unwrap();
        let spec = shell_spec(&dir, "sleeper", "exec sleep 30");
        let sup = supervisor();
        let handle = sup.launch(&spec).unwrap();

        match sup.terminate(handle).await {
            TerminationOutcome::Exited(status) => assert!(!status.success()),
            other => panic!("expected exit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_terminate_escalates_to_kill() {
        let dir = TempDir::new().unwrap();
        let spec = shell_spec(&dir, "stubborn", "trap '' TERM; while true; do sleep 1; done");
        let sup = ProcessSupervisor::new(Duration::from_millis(50), Duration::from_millis(500));
        let handle = sup.launch(&spec).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let outcome = sup.terminate(handle).await;
        assert!(matches!(outcome, TerminationOutcome::Exited(_)));
    }
}
