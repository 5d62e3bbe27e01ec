//! Chain access: the [`ChainClient`] seam and its JSON-RPC implementation.

pub mod address;
pub mod erc20;
pub mod evm;
#[cfg(test)]
pub(crate) mod mock;
pub mod rpc;
pub mod units;

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;

pub use evm::EvmClient;

/// ERC-20 metadata as reported by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

/// Everything the wallet needs from a node.
///
/// Amounts crossing this boundary are human decimal strings (`"1.5"`);
/// token balances come back as raw `uint256` base units.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance of `address`, formatted in ether.
    async fn get_native_balance(&self, address: &str) -> Result<String, ChainError>;

    async fn get_token_balance(&self, token: &str, owner: &str) -> Result<U256, ChainError>;

    async fn get_token_decimals(&self, token: &str) -> Result<u8, ChainError>;

    async fn get_token_metadata(&self, token: &str) -> Result<TokenMetadata, ChainError>;

    /// Sign and broadcast a native transfer. Returns the transaction hash.
    async fn submit_transfer(
        &self,
        private_key: &str,
        to: &str,
        amount: &str,
    ) -> Result<String, ChainError>;

    /// Sign and broadcast an ERC-20 `transfer`. Returns the transaction hash.
    async fn submit_token_transfer(
        &self,
        private_key: &str,
        token: &str,
        to: &str,
        amount: &str,
        decimals: u8,
    ) -> Result<String, ChainError>;

    /// `None` while the transaction is unmined, otherwise whether it
    /// succeeded.
    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<bool>, ChainError>;
}
