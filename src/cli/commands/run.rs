//! `syncbench run`: the full benchmark pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::adapters::sqlite::open_results_store;
use crate::adapters::JsonFileSink;
use crate::application::SyncTestRunner;
use crate::cli::output::{key_value_table, output, report_rows, CommandOutput};
use crate::domain::models::{Config, Network, SyncReport, SyncTarget};
use crate::infrastructure::config::ConfigLoader;
use crate::services::MetricsRecorder;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Network to sync (mainnet, testnet, staging, shelley_qa)
    #[arg(short, long)]
    pub environment: Option<Network>,

    /// Which follower to measure
    #[arg(short, long, value_enum)]
    pub target: Option<TargetArg>,

    /// Node tag or PR under test
    #[arg(long)]
    pub node_tag: Option<String>,

    /// db-sync branch under test
    #[arg(long)]
    pub db_sync_branch: Option<String>,

    /// Directory holding cardano-node/ and cardano-db-sync/
    #[arg(short, long)]
    pub workspace: Option<String>,

    /// Also insert the report into the results store
    #[arg(long)]
    pub publish: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetArg {
    Node,
    DbSync,
}

impl From<TargetArg> for SyncTarget {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Node => Self::Node,
            TargetArg::DbSync => Self::DbSync,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub run_id: String,
    pub report_file: String,
    pub published: bool,
    pub report: SyncReport,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut out = format!("Sync test {} finished\n", self.run_id);
        out.push_str(&key_value_table(&report_rows(&self.report)));
        out.push_str(&format!("\nReport written to {}", self.report_file));
        if self.published {
            out.push_str("\nReport published to the results store");
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Command-line flags override the loaded configuration.
pub fn apply_overrides(mut config: Config, args: &RunArgs) -> Result<Config> {
    if let Some(environment) = args.environment {
        config.environment = environment;
    }
    if let Some(target) = args.target {
        config.target = target.into();
    }
    if let Some(tag) = &args.node_tag {
        config.node_tag = Some(tag.clone());
    }
    if let Some(branch) = &args.db_sync_branch {
        config.db_sync_branch = Some(branch.clone());
    }
    if let Some(workspace) = &args.workspace {
        config.workspace_dir.clone_from(workspace);
    }
    if args.publish {
        config.results.publish_on_success = true;
    }
    ConfigLoader::validate(&config)?;
    Ok(config)
}

pub async fn execute(args: RunArgs, config: Config, json_mode: bool) -> Result<()> {
    let config = apply_overrides(config, &args)?;

    let report_file = Config::resolve(&config.workspace(), &config.results.report_file);
    let mut recorder = MetricsRecorder::default().with_sink(Arc::new(JsonFileSink::new(&report_file)));
    if config.results.publish_on_success {
        let db_path = Config::resolve(&config.workspace(), &config.results.database_path);
        let store = open_results_store(&db_path)
            .await
            .with_context(|| format!("Failed to open results store {}", db_path.display()))?;
        recorder = recorder.with_sink(Arc::new(store));
    }

    let published = config.results.publish_on_success;
    let runner = SyncTestRunner::new(config, recorder)?;
    let run_id = runner.run_id().to_string();
    let report = runner.run().await.context("Sync test failed")?;

    output(
        &RunOutput {
            run_id,
            report_file: report_file.display().to_string(),
            published,
            report,
        },
        json_mode,
    );
    Ok(())
}
