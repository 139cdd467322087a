use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cardano network a run syncs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Mainnet,
    Testnet,
    Staging,
    ShelleyQa,
}

impl Network {
    /// Network selection arguments for `cardano-cli`.
    pub fn cli_args(self) -> Vec<String> {
        match self.testnet_magic() {
            None => vec!["--mainnet".to_string()],
            Some(magic) => vec!["--testnet-magic".to_string(), magic.to_string()],
        }
    }

    pub const fn testnet_magic(self) -> Option<u32> {
        match self {
            Self::Mainnet => None,
            Self::Testnet => Some(1_097_911_063),
            Self::Staging => Some(633_343_913),
            Self::ShelleyQa => Some(3),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Staging => "staging",
            Self::ShelleyQa => "shelley_qa",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "staging" => Ok(Self::Staging),
            "shelley_qa" => Ok(Self::ShelleyQa),
            other => Err(format!(
                "unknown environment '{other}', expected one of: mainnet, testnet, staging, shelley_qa"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args() {
        assert_eq!(Network::Mainnet.cli_args(), vec!["--mainnet"]);
        assert_eq!(
            Network::Testnet.cli_args(),
            vec!["--testnet-magic", "1097911063"]
        );
        assert_eq!(Network::ShelleyQa.cli_args(), vec!["--testnet-magic", "3"]);
    }

    #[test]
    fn test_round_trip_names() {
        for network in [
            Network::Mainnet,
            Network::Testnet,
            Network::Staging,
            Network::ShelleyQa,
        ] {
            assert_eq!(network.as_str().parse::<Network>().unwrap(), network);
        }
        assert!("preview".parse::<Network>().is_err());
    }
}
