use async_trait::async_trait;

use crate::domain::errors::ParseError;
use crate::domain::models::{Config, ProgressReading, SyncPrecision};
use crate::domain::ports::{ProbeFailure, ProgressSource};
use crate::infrastructure::process::{run_command, CommandSpec};

/// `cardano-cli query tip` against the local node socket.
///
/// Reports `syncProgress` with integer precision. No timeout is applied: a
/// hung CLI stalls the caller.
#[derive(Debug, Clone)]
pub struct NodeTipSource {
    command: CommandSpec,
}

impl NodeTipSource {
    pub fn new(config: &Config) -> Self {
        let command = CommandSpec::new(&config.node.cli_binary, config.node_dir())
            .args(["query", "tip"])
            .args(config.environment.cli_args())
            .env("CARDANO_NODE_SOCKET_PATH", &config.node.socket_path);
        Self { command }
    }

    pub const fn command(&self) -> &CommandSpec {
        &self.command
    }
}

#[async_trait]
impl ProgressSource for NodeTipSource {
    fn name(&self) -> &str {
        "node-tip"
    }

    fn precision(&self) -> SyncPrecision {
        SyncPrecision::Integer
    }

    async fn query(&self) -> Result<String, ProbeFailure> {
        run_command(&self.command).await
    }

    fn parse(&self, raw: &str) -> Result<ProgressReading, ParseError> {
        ProgressReading::from_tip_json(raw, self.precision())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Network;

    #[test]
    fn test_command_carries_network_and_socket() {
        let config = Config {
            environment: Network::Staging,
            workspace_dir: "/work".to_string(),
            ..Config::default()
        };
        let source = NodeTipSource::new(&config);
        let cmd = source.command();

        assert_eq!(
            cmd.display(),
            "./cardano-cli query tip --testnet-magic 633343913"
        );
        assert_eq!(cmd.working_dir, std::path::PathBuf::from("/work/cardano-node"));
        assert_eq!(
            cmd.env.get("CARDANO_NODE_SOCKET_PATH").map(String::as_str),
            Some("db/node.socket")
        );
        assert!(cmd.timeout.is_none());
    }

    #[test]
    fn test_parse_truncates_percent() {
        let source = NodeTipSource::new(&Config::default());
        let reading = source
            .parse(r#"{"epoch": 12, "block": 400, "hash": "ff", "slot": 9000, "era": "Babbage", "syncProgress": "99.87"}"#)
            .unwrap();
        assert_eq!(reading.sync_percent, Some(99.0));
        assert_eq!(reading.era, "babbage");
    }
}
