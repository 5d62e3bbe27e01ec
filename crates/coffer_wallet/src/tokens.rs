//! Token catalog: well-known tokens per network plus the user's custom list.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use coffer_core::Store;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::network::Network;

pub const CUSTOM_TOKENS_KEY: &str = "tokens.custom";

/// A token as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Human decimal string, refreshed on every sync.
    pub balance: String,
}

/// A token the user added by contract address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomToken {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellKnownToken {
    pub address: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
}

const MAINNET_TOKENS: &[WellKnownToken] = &[
    WellKnownToken {
        address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        symbol: "USDC",
        name: "USD Coin",
    },
    WellKnownToken {
        address: "0xdAC17F958D2ee523a2206206994597C13D831ec7",
        symbol: "USDT",
        name: "Tether USD",
    },
    WellKnownToken {
        address: "0x6B175474E89094C44Da98b954EedeAC495271d0F",
        symbol: "DAI",
        name: "Dai Stablecoin",
    },
];

const SEPOLIA_TOKENS: &[WellKnownToken] = &[
    WellKnownToken {
        address: "0x779877A7B0D9E8603169DdbD7836e478b4624789",
        symbol: "LINK",
        name: "ChainLink Token",
    },
    WellKnownToken {
        address: "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC",
        symbol: "DAI",
        name: "Dai Stablecoin",
    },
    WellKnownToken {
        address: "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984",
        symbol: "UNI",
        name: "Uniswap",
    },
];

const GOERLI_TOKENS: &[WellKnownToken] = &[
    WellKnownToken {
        address: "0xB4FBF271143F4FBf7B91A5ded31805e42b2208d6",
        symbol: "WETH",
        name: "Wrapped Ether",
    },
    WellKnownToken {
        address: "0x07865c6E87B9F70255377e024ace6630C1Eaa37F",
        symbol: "USDC",
        name: "USD Coin",
    },
    WellKnownToken {
        address: "0x326C977E6efc84E512bB9C30f76E30c160eD06FB",
        symbol: "LINK",
        name: "ChainLink Token",
    },
];

pub fn well_known_tokens(network: Network) -> &'static [WellKnownToken] {
    match network {
        Network::Mainnet => MAINNET_TOKENS,
        Network::Sepolia => SEPOLIA_TOKENS,
        Network::Goerli => GOERLI_TOKENS,
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// A token to look up during a refresh.
///
/// `decimals` is only a fallback for when the contract does not answer
/// `decimals()`; custom tokens carry what was fetched when they were added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCandidate {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: Option<u8>,
}

impl From<&WellKnownToken> for TokenCandidate {
    fn from(token: &WellKnownToken) -> Self {
        Self {
            address: token.address.to_string(),
            symbol: token.symbol.to_string(),
            name: token.name.to_string(),
            decimals: None,
        }
    }
}

impl From<&CustomToken> for TokenCandidate {
    fn from(token: &CustomToken) -> Self {
        Self {
            address: token.address.clone(),
            symbol: token.symbol.clone(),
            name: token.name.clone(),
            decimals: Some(token.decimals),
        }
    }
}

/// Well-known tokens for `network` followed by `custom`, deduplicated by
/// case-insensitive address. The first occurrence wins.
pub fn merge_candidates(network: Network, custom: &[CustomToken]) -> Vec<TokenCandidate> {
    let all = well_known_tokens(network)
        .iter()
        .map(TokenCandidate::from)
        .chain(custom.iter().map(TokenCandidate::from));
    dedupe_by_address(all, |c| c.address.as_str())
}

/// Keep the first item per case-insensitive address, preserving order.
pub fn dedupe_by_address<T>(
    items: impl IntoIterator<Item = T>,
    address: impl Fn(&T) -> &str,
) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(address(item).to_ascii_lowercase()))
        .collect()
}

// ---------------------------------------------------------------------------
// Custom token persistence
// ---------------------------------------------------------------------------

/// The user's custom tokens, persisted under [`CUSTOM_TOKENS_KEY`].
#[derive(Clone)]
pub struct CustomTokenList {
    store: Arc<Store>,
}

impl CustomTokenList {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<CustomToken>> {
        Ok(self
            .store
            .get_json::<Vec<CustomToken>>(CUSTOM_TOKENS_KEY)?
            .unwrap_or_default())
    }

    /// Insert or replace by case-insensitive address.
    pub fn upsert(&self, token: CustomToken) -> Result<()> {
        let address = token.address.clone();
        let replaced = self
            .store
            .update_json(CUSTOM_TOKENS_KEY, |tokens: &mut Vec<CustomToken>| {
                let existing = tokens
                    .iter()
                    .position(|t| t.address.eq_ignore_ascii_case(&token.address));
                match existing {
                    Some(i) => tokens[i] = token,
                    None => tokens.push(token),
                }
                existing.is_some()
            })?;
        info!(token = %address, replaced, "custom token saved");
        Ok(())
    }
}
