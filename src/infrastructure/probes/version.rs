use std::path::Path;

use crate::domain::errors::SyncTestError;
use crate::domain::models::{parse_version_output, VersionInfo};
use crate::infrastructure::process::{run_command, CommandSpec};

pub const CLI_REVISION_MARKER: &str = "git rev ";
pub const DB_SYNC_REVISION_MARKER: &str = "git revision ";

/// Run `<program> --version` and split out the git revision.
pub async fn binary_version(
    program: &str,
    working_dir: &Path,
    marker: &'static str,
) -> Result<VersionInfo, SyncTestError> {
    let spec = CommandSpec::new(program, working_dir).args(["--version"]);
    let output = run_command(&spec)
        .await
        .map_err(|failure| SyncTestError::Command {
            command: spec.display(),
            output: failure.reason,
        })?;
    let (version, git_revision) = parse_version_output(&output, marker)?;
    Ok(VersionInfo {
        version,
        git_revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_cli_version() {
        let dir = tempfile::tempdir().unwrap();
        script(
            dir.path(),
            "cardano-cli",
            "echo 'cardano-cli 8.1.2 - linux-x86_64 - ghc-8.10'; echo 'git rev d2d90b48c5577b4412d5c9c9968b55f8ab4b9767'",
        );

        let info = binary_version("./cardano-cli", dir.path(), CLI_REVISION_MARKER)
            .await
            .unwrap();
        assert_eq!(info.version, "cardano-cli 8.1.2 - linux-x86_64 - ghc-8.10");
        assert_eq!(info.git_revision, "d2d90b48c5577b4412d5c9c9968b55f8ab4b9767");
    }

    #[tokio::test]
    async fn test_output_without_marker_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        script(dir.path(), "cardano-db-sync", "echo 'cardano-db-sync 13.1.0.0'");

        let err = binary_version("./cardano-db-sync", dir.path(), DB_SYNC_REVISION_MARKER)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncTestError::Parse(_)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = binary_version("./no-such-cli", dir.path(), CLI_REVISION_MARKER)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncTestError::Command { .. }));
    }
}
