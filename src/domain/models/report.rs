//! The sync report: the single record a run produces.

use serde::{Deserialize, Serialize};

/// Host facts captured at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFacts {
    pub system: String,
    pub release: String,
    pub version: String,
    pub cpu_cores: usize,
    pub total_ram_gb: u64,
}

/// Version text and git revision reported by a binary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_revision: String,
}

/// Identifiers of what was under test.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunIdentifiers {
    pub env: String,
    pub node_tag: Option<String>,
    pub db_sync_branch: Option<String>,
    pub node: VersionInfo,
    pub db_sync: Option<VersionInfo>,
}

/// Timestamps and durations measured by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTimestamps {
    pub start_test_time: String,
    pub end_test_time: String,
    pub node_start_time_in_sec: u64,
    pub total_sync_time_in_sec: u64,
}

/// Final report of a successful run. Built once by the metrics recorder.
///
/// Field order is the on-disk order of `test_results.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub platform_system: String,
    pub platform_release: String,
    pub platform_version: String,
    pub no_of_cpu_cores: usize,
    pub total_ram_in_gb: u64,
    pub env: String,
    pub node_tag: Option<String>,
    pub db_sync_branch: Option<String>,
    pub node_cli_version: String,
    pub node_git_revision: String,
    pub db_sync_version: Option<String>,
    pub db_sync_git_rev: Option<String>,
    pub start_test_time: String,
    pub end_test_time: String,
    pub node_start_time_in_sec: u64,
    pub total_sync_time_in_sec: u64,
    pub total_sync_time_in_h_m_s: String,
    pub last_synced_epoch_no: Option<u64>,
    pub last_synced_block_no: u64,
}

/// Format seconds as `H:MM:SS`, prefixed with `N day(s), ` past 24 hours.
pub fn seconds_to_time(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    match days {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("1 day, {hours}:{minutes:02}:{seconds:02}"),
        n => format!("{n} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_time() {
        assert_eq!(seconds_to_time(0), "0:00:00");
        assert_eq!(seconds_to_time(59), "0:00:59");
        assert_eq!(seconds_to_time(3661), "1:01:01");
        assert_eq!(seconds_to_time(86_400), "1 day, 0:00:00");
        assert_eq!(seconds_to_time(2 * 86_400 + 7322), "2 days, 2:02:02");
    }
}
