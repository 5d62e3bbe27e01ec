use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported EVM networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Sepolia,
    Goerli,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Mainnet, Network::Sepolia, Network::Goerli];

    /// Human-readable label for the network.
    pub fn label(&self) -> &'static str {
        match self {
            Network::Mainnet => "Ethereum Mainnet",
            Network::Sepolia => "Sepolia Testnet",
            Network::Goerli => "Goerli Testnet",
        }
    }

    /// EIP-155 chain ID.
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Sepolia => 11_155_111,
            Network::Goerli => 5,
        }
    }

    /// Public node used when no custom endpoint is configured.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://ethereum-rpc.publicnode.com",
            Network::Sepolia => "https://ethereum-sepolia-rpc.publicnode.com",
            Network::Goerli => "https://ethereum-goerli-rpc.publicnode.com",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "ethereum" => Ok(Network::Mainnet),
            "sepolia" => Ok(Network::Sepolia),
            "goerli" => Ok(Network::Goerli),
            other => anyhow::bail!("unknown network: {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Gas price preference
// ---------------------------------------------------------------------------

/// Scales the node's suggested gas price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasPreference {
    Low,
    #[default]
    Medium,
    High,
}

impl GasPreference {
    /// Multiplier in percent applied to the suggested price.
    pub fn percent(&self) -> u128 {
        match self {
            GasPreference::Low => 90,
            GasPreference::Medium => 100,
            GasPreference::High => 125,
        }
    }

    pub fn apply(&self, suggested_wei: u128) -> u128 {
        suggested_wei.saturating_mul(self.percent()) / 100
    }
}

impl FromStr for GasPreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(GasPreference::Low),
            "medium" => Ok(GasPreference::Medium),
            "high" => Ok(GasPreference::High),
            other => anyhow::bail!("unknown gas price preference: {other}"),
        }
    }
}
