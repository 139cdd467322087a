use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::domain::ports::ProbeFailure;

/// A one-shot command whose output is captured.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: BTreeMap<String, String>,
    /// Kill the command if it has not finished in time. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Human-readable command line for logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Paths containing a separator are resolved against `working_dir`; bare
/// names are left for `PATH` lookup.
pub fn resolve_program(working_dir: &Path, program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_absolute() || !program.contains(std::path::MAIN_SEPARATOR) {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

/// Run `spec` to completion and return its trimmed stdout.
///
/// A non-zero exit is a failure whose reason carries the exit code and the
/// combined stdout/stderr, so callers can match on error markers.
pub async fn run_command(spec: &CommandSpec) -> Result<String, ProbeFailure> {
    let program = resolve_program(&spec.working_dir, &spec.program);
    debug!(command = %spec.display(), cwd = %spec.working_dir.display(), "running command");

    let child = Command::new(&program)
        .args(&spec.args)
        .envs(&spec.env)
        .current_dir(&spec.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ProbeFailure::new(format!("failed to run `{}`: {e}", spec.display())))?;

    let output = match spec.timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| {
                ProbeFailure::new(format!(
                    "`{}` did not finish within {}s",
                    spec.display(),
                    limit.as_secs()
                ))
            })?,
        None => child.wait_with_output().await,
    }
    .map_err(|e| ProbeFailure::new(format!("failed to wait for `{}`: {e}", spec.display())))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if output.status.success() {
        return Ok(stdout.trim().to_string());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{stdout} {stderr}")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    Err(ProbeFailure::new(format!(
        "`{}` returned error (code {}): {combined}",
        spec.display(),
        output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string()),
    )))
}
