use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use super::network::Network;

/// Main configuration structure for a sync benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Network to sync against
    #[serde(default = "default_environment")]
    pub environment: Network,

    /// Which follower the run measures
    #[serde(default)]
    pub target: SyncTarget,

    /// Root directory holding the node and db-sync working directories
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,

    /// Node tag or PR under test, recorded in the report
    #[serde(default, deserialize_with = "deserialize_label")]
    pub node_tag: Option<String>,

    /// db-sync branch under test, recorded in the report
    #[serde(default, deserialize_with = "deserialize_label")]
    pub db_sync_branch: Option<String>,

    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub db_sync: DbSyncConfig,

    #[serde(default)]
    pub postgres: PostgresConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub results: ResultsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_environment() -> Network {
    Network::ShelleyQa
}

fn default_workspace_dir() -> String {
    ".".to_string()
}

/// Build labels are often bare PR numbers, which YAML and env providers read as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Label {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

fn deserialize_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Label>::deserialize(deserializer)?.map(|label| match label {
        Label::Text(s) => s,
        Label::Unsigned(n) => n.to_string(),
        Label::Signed(n) => n.to_string(),
        Label::Float(n) => n.to_string(),
    }))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            target: SyncTarget::default(),
            workspace_dir: default_workspace_dir(),
            node_tag: None,
            db_sync_branch: None,
            node: NodeConfig::default(),
            db_sync: DbSyncConfig::default(),
            postgres: PostgresConfig::default(),
            polling: PollingConfig::default(),
            results: ResultsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn workspace(&self) -> PathBuf {
        PathBuf::from(&self.workspace_dir)
    }

    pub fn node_dir(&self) -> PathBuf {
        self.workspace().join(&self.node.dir_name)
    }

    pub fn db_sync_dir(&self) -> PathBuf {
        self.workspace().join(&self.db_sync.dir_name)
    }

    /// Postgres database holding db-sync's tables; defaults to the network name.
    pub fn postgres_database(&self) -> String {
        self.postgres
            .database
            .clone()
            .unwrap_or_else(|| self.environment.to_string())
    }

    /// Resolve `path` against `base` unless it is already absolute.
    pub fn resolve(base: &Path, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            base.join(p)
        }
    }
}

/// Follower whose convergence ends the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTarget {
    /// Track `cardano-node` via `query tip`
    Node,
    /// Track `cardano-db-sync` via SQL progress
    #[default]
    DbSync,
}

/// cardano-node launch and readiness settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NodeConfig {
    #[serde(default = "default_node_dir_name")]
    pub dir_name: String,

    /// Node binary, relative to the node directory
    #[serde(default = "default_node_binary")]
    pub binary: String,

    /// CLI binary, relative to the node directory
    #[serde(default = "default_cli_binary")]
    pub cli_binary: String,

    #[serde(default = "default_host_addr")]
    pub host_addr: String,

    #[serde(default = "default_node_port")]
    pub port: u16,

    /// Socket path, relative to the node directory
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    #[serde(default = "default_node_log_file")]
    pub log_file: String,

    /// Seconds to wait for the `db` directory to appear
    #[serde(default = "default_db_ready_timeout_secs")]
    pub db_ready_timeout_secs: u64,

    /// Seconds to wait for `query tip` to answer (ledger replay can be slow)
    #[serde(default = "default_query_ready_timeout_secs")]
    pub query_ready_timeout_secs: u64,
}

fn default_node_dir_name() -> String {
    "cardano-node".to_string()
}

fn default_node_binary() -> String {
    "./cardano-node".to_string()
}

fn default_cli_binary() -> String {
    "./cardano-cli".to_string()
}

fn default_host_addr() -> String {
    "0.0.0.0".to_string()
}

const fn default_node_port() -> u16 {
    3000
}

fn default_socket_path() -> String {
    "db/node.socket".to_string()
}

fn default_node_log_file() -> String {
    "node_logfile.log".to_string()
}

const fn default_db_ready_timeout_secs() -> u64 {
    300
}

const fn default_query_ready_timeout_secs() -> u64 {
    18_000
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            dir_name: default_node_dir_name(),
            binary: default_node_binary(),
            cli_binary: default_cli_binary(),
            host_addr: default_host_addr(),
            port: default_node_port(),
            socket_path: default_socket_path(),
            log_file: default_node_log_file(),
            db_ready_timeout_secs: default_db_ready_timeout_secs(),
            query_ready_timeout_secs: default_query_ready_timeout_secs(),
        }
    }
}

/// cardano-db-sync launch settings
///
/// `args` and `env` values may contain `{env}`, replaced by the network name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DbSyncConfig {
    #[serde(default = "default_db_sync_dir_name")]
    pub dir_name: String,

    /// db-sync binary, relative to the db-sync directory
    #[serde(default = "default_db_sync_binary")]
    pub binary: String,

    #[serde(default = "default_db_sync_args")]
    pub args: Vec<String>,

    #[serde(default = "default_db_sync_env")]
    pub env: BTreeMap<String, String>,

    #[serde(default = "default_db_sync_log_file")]
    pub log_file: String,

    /// Seconds to wait for the progress query to return a number
    #[serde(default = "default_db_sync_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Dump `epoch_sync_time` rows after convergence
    #[serde(default = "default_true")]
    pub export_epoch_sync_times: bool,

    #[serde(default = "default_epoch_sync_times_file")]
    pub epoch_sync_times_file: String,
}

fn default_db_sync_dir_name() -> String {
    "cardano-db-sync".to_string()
}

fn default_db_sync_binary() -> String {
    "db-sync-node/bin/cardano-db-sync".to_string()
}

fn default_db_sync_args() -> Vec<String> {
    [
        "--config",
        "config/{env}-config.yaml",
        "--socket-path",
        "../cardano-node/db/node.socket",
        "--state-dir",
        "ledger-state/{env}",
        "--schema-dir",
        "schema/",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_db_sync_env() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "PGPASSFILE".to_string(),
        "config/pgpass-{env}".to_string(),
    )])
}

fn default_db_sync_log_file() -> String {
    "db_sync_logfile.log".to_string()
}

const fn default_db_sync_ready_timeout_secs() -> u64 {
    600
}

const fn default_true() -> bool {
    true
}

fn default_epoch_sync_times_file() -> String {
    "epoch_sync_times_dump.json".to_string()
}

impl Default for DbSyncConfig {
    fn default() -> Self {
        Self {
            dir_name: default_db_sync_dir_name(),
            binary: default_db_sync_binary(),
            args: default_db_sync_args(),
            env: default_db_sync_env(),
            log_file: default_db_sync_log_file(),
            ready_timeout_secs: default_db_sync_ready_timeout_secs(),
            export_epoch_sync_times: default_true(),
            epoch_sync_times_file: default_epoch_sync_times_file(),
        }
    }
}

/// Postgres connection used by the SQL probes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PostgresConfig {
    #[serde(default = "default_psql_binary")]
    pub psql_binary: String,

    #[serde(default = "default_pg_host")]
    pub host: String,

    #[serde(default = "default_pg_port")]
    pub port: u16,

    #[serde(default = "default_pg_user")]
    pub user: String,

    /// Database name (defaults to the network name)
    #[serde(default)]
    pub database: Option<String>,

    /// Upper bound on a single SQL probe
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_psql_binary() -> String {
    "psql".to_string()
}

fn default_pg_host() -> String {
    "localhost".to_string()
}

const fn default_pg_port() -> u16 {
    5432
}

fn default_pg_user() -> String {
    "postgres".to_string()
}

const fn default_query_timeout_secs() -> u64 {
    5
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            psql_binary: default_psql_binary(),
            host: default_pg_host(),
            port: default_pg_port(),
            user: default_pg_user(),
            database: None,
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

/// Poll cadence, backoff and ceilings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PollingConfig {
    #[serde(default = "default_cli_backoff_secs")]
    pub cli_backoff_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub cli_max_attempts: u32,

    #[serde(default = "default_sql_backoff_secs")]
    pub sql_backoff_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub sql_max_attempts: u32,

    /// Fine cadence of the convergence loop
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Re-query the source every N ticks
    #[serde(default = "default_requery_every_ticks")]
    pub requery_every_ticks: u64,

    /// Cadence of on-disk readiness checks
    #[serde(default = "default_tick_secs")]
    pub readiness_interval_secs: u64,

    /// Time a terminated process gets before it is reported as lingering
    #[serde(default = "default_termination_grace_secs")]
    pub termination_grace_secs: u64,
}

const fn default_cli_backoff_secs() -> u64 {
    60
}

const fn default_sql_backoff_secs() -> u64 {
    5
}

const fn default_max_attempts() -> u32 {
    10
}

const fn default_tick_secs() -> u64 {
    1
}

const fn default_requery_every_ticks() -> u64 {
    60
}

const fn default_termination_grace_secs() -> u64 {
    20
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            cli_backoff_secs: default_cli_backoff_secs(),
            cli_max_attempts: default_max_attempts(),
            sql_backoff_secs: default_sql_backoff_secs(),
            sql_max_attempts: default_max_attempts(),
            tick_secs: default_tick_secs(),
            requery_every_ticks: default_requery_every_ticks(),
            readiness_interval_secs: default_tick_secs(),
            termination_grace_secs: default_termination_grace_secs(),
        }
    }
}

impl PollingConfig {
    pub const fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub const fn termination_grace(&self) -> Duration {
        Duration::from_secs(self.termination_grace_secs)
    }
}

/// Where the run's report goes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResultsConfig {
    /// Report file, relative to the workspace
    #[serde(default = "default_report_file")]
    pub report_file: String,

    /// `SQLite` results store
    #[serde(default = "default_results_db")]
    pub database_path: String,

    /// Also insert the report into the results store at the end of `run`
    #[serde(default)]
    pub publish_on_success: bool,
}

fn default_report_file() -> String {
    "test_results.json".to_string()
}

fn default_results_db() -> String {
    ".syncbench/results.db".to_string()
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            report_file: default_report_file(),
            database_path: default_results_db(),
            publish_on_success: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
