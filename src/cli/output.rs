//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use serde::Serialize;

use crate::domain::models::SyncReport;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Report fields in file order, rendered for display.
pub fn report_rows(report: &SyncReport) -> Vec<(&'static str, String)> {
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    vec![
        ("platform_system", report.platform_system.clone()),
        ("platform_release", report.platform_release.clone()),
        ("platform_version", report.platform_version.clone()),
        ("no_of_cpu_cores", report.no_of_cpu_cores.to_string()),
        ("total_ram_in_gb", report.total_ram_in_gb.to_string()),
        ("env", report.env.clone()),
        ("node_tag", opt(&report.node_tag)),
        ("db_sync_branch", opt(&report.db_sync_branch)),
        ("node_cli_version", report.node_cli_version.clone()),
        ("node_git_revision", report.node_git_revision.clone()),
        ("db_sync_version", opt(&report.db_sync_version)),
        ("db_sync_git_rev", opt(&report.db_sync_git_rev)),
        ("start_test_time", report.start_test_time.clone()),
        ("end_test_time", report.end_test_time.clone()),
        ("node_start_time_in_sec", report.node_start_time_in_sec.to_string()),
        ("total_sync_time_in_sec", report.total_sync_time_in_sec.to_string()),
        ("total_sync_time_in_h_m_s", report.total_sync_time_in_h_m_s.clone()),
        (
            "last_synced_epoch_no",
            report
                .last_synced_epoch_no
                .map_or_else(|| "-".to_string(), |e| e.to_string()),
        ),
        ("last_synced_block_no", report.last_synced_block_no.to_string()),
    ]
}

/// Two-column table of `rows`.
pub fn key_value_table<K: AsRef<str>, V: AsRef<str>>(rows: &[(K, V)]) -> String {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Field").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);
    for (key, value) in rows {
        table.add_row(vec![key.as_ref(), value.as_ref()]);
    }
    table.to_string()
}
