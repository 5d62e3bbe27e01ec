use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxKind, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::chain::address::{parse_address, validate_address};
use crate::chain::erc20;
use crate::chain::rpc::RpcClient;
use crate::chain::units::{to_base_units, to_display};
use crate::chain::{ChainClient, TokenMetadata};
use crate::endpoint::RpcEndpoint;
use crate::error::ChainError;
use crate::keys;
use crate::network::{GasPreference, Network};

/// Gas for a plain value transfer.
const NATIVE_TRANSFER_GAS: u64 = 21_000;
/// Headroom added on top of `eth_estimateGas` for contract calls, in percent.
const GAS_ESTIMATE_MARGIN: u64 = 20;
/// Decimals assumed when a token does not answer `decimals()`.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// [`ChainClient`] backed by a JSON-RPC endpoint of an EVM network.
pub struct EvmClient {
    rpc: RpcClient,
    network: Network,
    gas: GasPreference,
}

impl EvmClient {
    pub fn new(
        url: impl Into<String>,
        network: Network,
        timeout: Duration,
        gas: GasPreference,
    ) -> Result<Self, ChainError> {
        Ok(Self {
            rpc: RpcClient::new(url, timeout)?,
            network,
            gas,
        })
    }

    pub fn from_endpoint(endpoint: &RpcEndpoint, gas: GasPreference) -> Result<Self, ChainError> {
        Self::new(endpoint.url.clone(), endpoint.network, endpoint.timeout, gas)
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<U256, ChainError> {
        self.rpc.call(method, params).await
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Bytes, ChainError> {
        let params = json!([
            { "to": to.to_checksum(None), "data": Bytes::from(data) },
            "latest"
        ]);
        self.rpc.call("eth_call", params).await
    }

    /// Chain ID reported by the endpoint, checked against the configured
    /// network so a misconfigured URL cannot sign for the wrong chain.
    async fn checked_chain_id(&self) -> Result<u64, ChainError> {
        let reported = self.quantity("eth_chainId", json!([])).await?;
        let expected = self.network.chain_id();
        if reported != U256::from(expected) {
            return Err(ChainError::InvalidResponse(format!(
                "endpoint serves chain {reported}, expected {expected} ({})",
                self.network
            )));
        }
        Ok(expected)
    }

    /// Fill in nonce, gas price and chain id, then sign and broadcast.
    async fn sign_and_send(
        &self,
        signer: &PrivateKeySigner,
        to: Address,
        value: U256,
        input: Vec<u8>,
        gas_limit: u64,
    ) -> Result<String, ChainError> {
        let from = keys::address_of(signer);
        let (chain_id, nonce, suggested_price) = tokio::try_join!(
            self.checked_chain_id(),
            self.quantity("eth_getTransactionCount", json!([from, "pending"])),
            self.quantity("eth_gasPrice", json!([])),
        )?;

        let tx = TxLegacy {
            chain_id: Some(chain_id),
            nonce: narrow(nonce, "nonce")?,
            gas_price: self.gas.apply(narrow(suggested_price, "gas price")?),
            gas_limit,
            to: TxKind::Call(to),
            value,
            input: input.into(),
        };
        let (nonce, gas_price) = (tx.nonce, tx.gas_price);
        let raw = sign_legacy(signer, tx)?;

        let hash: String = self
            .rpc
            .call("eth_sendRawTransaction", json!([Bytes::from(raw)]))
            .await?;
        info!(
            tx_hash = %hash,
            from = %from,
            nonce,
            gas_price = %gas_price,
            network = %self.network,
            "transaction broadcast"
        );
        Ok(hash)
    }
}

/// EIP-155 signature over `tx`, returned as the raw RLP envelope.
fn sign_legacy(signer: &PrivateKeySigner, tx: TxLegacy) -> Result<Vec<u8>, ChainError> {
    let signature = signer
        .sign_hash_sync(&tx.signature_hash())
        .map_err(|e| ChainError::InvalidInput(format!("signing failed: {e}")))?;
    Ok(TxEnvelope::from(tx.into_signed(signature)).encoded_2718())
}

/// Fit a node-reported quantity into a narrower integer field.
fn narrow<T: TryFrom<U256>>(value: U256, what: &str) -> Result<T, ChainError> {
    T::try_from(value)
        .map_err(|_| ChainError::InvalidResponse(format!("{what} {value} out of range")))
}

fn signer_for(private_key: &str) -> Result<PrivateKeySigner, ChainError> {
    keys::parse_private_key(private_key).map_err(|e| ChainError::InvalidInput(e.to_string()))
}

fn amount_units(amount: &str, decimals: u8) -> Result<U256, ChainError> {
    to_base_units(amount, decimals).map_err(ChainError::InvalidInput)
}

#[async_trait]
impl ChainClient for EvmClient {
    async fn get_native_balance(&self, address: &str) -> Result<String, ChainError> {
        parse_address(address)?;
        let wei = self
            .quantity("eth_getBalance", json!([address, "latest"]))
            .await?;
        to_display(wei, 18).map_err(ChainError::InvalidResponse)
    }

    async fn get_token_balance(&self, token: &str, owner: &str) -> Result<U256, ChainError> {
        let token = parse_address(token)?;
        let owner = parse_address(owner)?;
        let output = self.eth_call(token, erc20::balance_of(owner)).await?;
        erc20::decode_balance(&output)
    }

    async fn get_token_decimals(&self, token: &str) -> Result<u8, ChainError> {
        let token = parse_address(token)?;
        let output = self.eth_call(token, erc20::decimals()).await?;
        erc20::decode_decimals(&output)
    }

    /// Each field falls back independently; only a contract that answers
    /// none of the three is an error.
    async fn get_token_metadata(&self, token: &str) -> Result<TokenMetadata, ChainError> {
        let contract = parse_address(token)?;
        let (symbol, name, decimals) = tokio::join!(
            self.eth_call(contract, erc20::symbol()),
            self.eth_call(contract, erc20::name()),
            self.get_token_decimals(token),
        );
        let symbol = symbol.and_then(|out| erc20::decode_text(&out));
        let name = name.and_then(|out| erc20::decode_text(&out));

        if let (Err(e), Err(_), Err(_)) = (&symbol, &name, &decimals) {
            warn!(token, error = %e, "token metadata unavailable");
            return Err(e.clone());
        }

        Ok(TokenMetadata {
            symbol: symbol.unwrap_or_else(|_| "UNKNOWN".into()),
            name: name.unwrap_or_else(|_| "Unknown Token".into()),
            decimals: decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS),
        })
    }

    async fn submit_transfer(
        &self,
        private_key: &str,
        to: &str,
        amount: &str,
    ) -> Result<String, ChainError> {
        let to = validate_address(to)?;
        let value = amount_units(amount, 18)?;
        let signer = signer_for(private_key)?;
        self.sign_and_send(&signer, to, value, Vec::new(), NATIVE_TRANSFER_GAS)
            .await
    }

    async fn submit_token_transfer(
        &self,
        private_key: &str,
        token: &str,
        to: &str,
        amount: &str,
        decimals: u8,
    ) -> Result<String, ChainError> {
        let contract = parse_address(token)?;
        let recipient = validate_address(to)?;
        let units = amount_units(amount, decimals)?;
        let signer = signer_for(private_key)?;
        let data = erc20::transfer(recipient, units);

        let estimate = self
            .quantity(
                "eth_estimateGas",
                json!([{
                    "from": keys::address_of(&signer),
                    "to": contract.to_checksum(None),
                    "data": Bytes::from(data.clone()),
                    "value": "0x0",
                }]),
            )
            .await?;
        let estimate: u64 = narrow(estimate, "gas estimate")?;
        let gas_limit = estimate.saturating_add(estimate * GAS_ESTIMATE_MARGIN / 100);
        debug!(token, estimate, gas_limit, "estimated token transfer gas");

        self.sign_and_send(&signer, contract, U256::ZERO, data, gas_limit)
            .await
    }

    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<bool>, ChainError> {
        let receipt: Option<Value> = self
            .rpc
            .call("eth_getTransactionReceipt", json!([hash]))
            .await?;
        let Some(receipt) = receipt else {
            return Ok(None);
        };
        // Receipts without `status` predate Byzantium and were only produced
        // for included transactions.
        match receipt.get("status").and_then(Value::as_str) {
            None => Ok(Some(true)),
            Some(status) => {
                let code: U256 = status
                    .parse()
                    .map_err(|_| ChainError::InvalidResponse(format!("bad receipt status '{status}'")))?;
                Ok(Some(code == U256::from(1u8)))
            }
        }
    }
}
