use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Prefix of environment overrides (`SYNCBENCH_POLLING__TICK_SECS=2`).
pub const ENV_PREFIX: &str = "SYNCBENCH_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid {0}: must be at least 1")]
    ZeroValue(&'static str),

    #[error("{0} cannot be empty")]
    EmptyValue(&'static str),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .syncbench/config.yaml
    /// 3. .syncbench/local.yaml (optional local overrides)
    /// 4. Environment variables (SYNCBENCH_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(Path::new("."))
    }

    /// Same precedence as [`ConfigLoader::load`], rooted at `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Config> {
        let config: Config = Self::figment_for_dir(dir)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment_for_dir(dir: &Path) -> Figment {
        let project = dir.join(".syncbench");
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(project.join("config.yaml")))
            .merge(Yaml::file(project.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let polling = &config.polling;
        for (name, value) in [
            ("polling.cli_backoff_secs", polling.cli_backoff_secs),
            ("polling.sql_backoff_secs", polling.sql_backoff_secs),
            ("polling.tick_secs", polling.tick_secs),
            ("polling.requery_every_ticks", polling.requery_every_ticks),
            ("polling.readiness_interval_secs", polling.readiness_interval_secs),
            ("postgres.query_timeout_secs", config.postgres.query_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroValue(name));
            }
        }
        if polling.cli_max_attempts == 0 {
            return Err(ConfigError::ZeroValue("polling.cli_max_attempts"));
        }
        if polling.sql_max_attempts == 0 {
            return Err(ConfigError::ZeroValue("polling.sql_max_attempts"));
        }

        for (name, value) in [
            ("workspace_dir", &config.workspace_dir),
            ("node.binary", &config.node.binary),
            ("node.cli_binary", &config.node.cli_binary),
            ("db_sync.binary", &config.db_sync.binary),
            ("postgres.psql_binary", &config.postgres.psql_binary),
            ("results.report_file", &config.results.report_file),
            ("results.database_path", &config.results.database_path),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyValue(name));
            }
        }

        if config.node.db_ready_timeout_secs == 0 || config.node.query_ready_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "node readiness timeouts must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
