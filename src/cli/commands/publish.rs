//! `syncbench publish`: store a finished report in the results database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::adapters::sqlite::open_results_store;
use crate::adapters::JsonFileSink;
use crate::cli::output::{key_value_table, output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Report file (default: results.report_file in the workspace)
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Results database (default: results.database_path in the workspace)
    #[arg(short, long)]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct PublishOutput {
    pub identifier: String,
    pub env: String,
    pub total_sync_time_in_h_m_s: String,
    pub database: String,
}

impl CommandOutput for PublishOutput {
    fn to_human(&self) -> String {
        key_value_table(&[
            ("identifier", self.identifier.as_str()),
            ("env", self.env.as_str()),
            ("total_sync_time", self.total_sync_time_in_h_m_s.as_str()),
            ("database", self.database.as_str()),
        ])
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn publish(report_path: &std::path::Path, db_path: &std::path::Path) -> Result<PublishOutput> {
    let report = JsonFileSink::read(report_path)
        .await
        .with_context(|| format!("Failed to read report {}", report_path.display()))?;
    let store = open_results_store(db_path)
        .await
        .with_context(|| format!("Failed to open results store {}", db_path.display()))?;
    let identifier = store.publish(&report).await?;

    Ok(PublishOutput {
        identifier,
        env: report.env,
        total_sync_time_in_h_m_s: report.total_sync_time_in_h_m_s,
        database: db_path.display().to_string(),
    })
}

pub async fn execute(args: PublishArgs, config: Config, json_mode: bool) -> Result<()> {
    let workspace = config.workspace();
    let report_path = args
        .report
        .unwrap_or_else(|| Config::resolve(&workspace, &config.results.report_file));
    let db_path = args
        .database
        .unwrap_or_else(|| Config::resolve(&workspace, &config.results.database_path));

    let result = publish(&report_path, &db_path).await?;
    output(&result, json_mode);
    Ok(())
}
