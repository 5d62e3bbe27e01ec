//! Scriptable in-memory [`ChainClient`] for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::U256;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::chain::{ChainClient, TokenMetadata};
use crate::error::ChainError;

fn key(address: &str) -> String {
    address.to_ascii_lowercase()
}

fn unreachable_node() -> ChainError {
    ChainError::Transport("connection refused".into())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransfer {
    pub to: String,
    pub amount: String,
    pub token: Option<String>,
}

#[derive(Default)]
pub struct MockChain {
    native: Mutex<HashMap<String, String>>,
    token_balances: Mutex<HashMap<String, Result<U256, ChainError>>>,
    decimals: Mutex<HashMap<String, u8>>,
    metadata: Mutex<HashMap<String, TokenMetadata>>,
    receipts: Mutex<HashMap<String, Result<Option<bool>, ChainError>>>,
    fail_submit: Mutex<Option<ChainError>>,
    submitted: Mutex<Vec<SubmittedTransfer>>,
    latency: Mutex<Option<Duration>>,
    next_hash: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_native(&self, address: &str, balance: &str) {
        self.native.lock().insert(key(address), balance.into());
    }

    pub fn set_token_balance(&self, token: &str, raw: U256) {
        self.token_balances.lock().insert(key(token), Ok(raw));
    }

    pub fn fail_token(&self, token: &str) {
        self.token_balances
            .lock()
            .insert(key(token), Err(unreachable_node()));
    }

    pub fn set_decimals(&self, token: &str, decimals: u8) {
        self.decimals.lock().insert(key(token), decimals);
    }

    pub fn set_metadata(&self, token: &str, symbol: &str, name: &str, decimals: u8) {
        self.metadata.lock().insert(
            key(token),
            TokenMetadata {
                symbol: symbol.into(),
                name: name.into(),
                decimals,
            },
        );
    }

    pub fn set_receipt(&self, hash: &str, receipt: Option<bool>) {
        self.receipts.lock().insert(key(hash), Ok(receipt));
    }

    pub fn fail_receipt(&self, hash: &str) {
        self.receipts
            .lock()
            .insert(key(hash), Err(unreachable_node()));
    }

    pub fn fail_submissions(&self, error: ChainError) {
        *self.fail_submit.lock() = Some(error);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn submitted(&self) -> Vec<SubmittedTransfer> {
        self.submitted.lock().clone()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn submit(&self, transfer: SubmittedTransfer) -> Result<String, ChainError> {
        if let Some(err) = self.fail_submit.lock().clone() {
            return Err(err);
        }
        self.submitted.lock().push(transfer);
        let n = self.next_hash.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("0x{n:064x}"))
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_native_balance(&self, address: &str) -> Result<String, ChainError> {
        self.simulate_latency().await;
        self.native
            .lock()
            .get(&key(address))
            .cloned()
            .ok_or_else(unreachable_node)
    }

    async fn get_token_balance(&self, token: &str, _owner: &str) -> Result<U256, ChainError> {
        self.simulate_latency().await;
        self.token_balances
            .lock()
            .get(&key(token))
            .cloned()
            .unwrap_or(Ok(U256::ZERO))
    }

    async fn get_token_decimals(&self, token: &str) -> Result<u8, ChainError> {
        self.simulate_latency().await;
        self.decimals
            .lock()
            .get(&key(token))
            .copied()
            .ok_or_else(unreachable_node)
    }

    async fn get_token_metadata(&self, token: &str) -> Result<TokenMetadata, ChainError> {
        self.simulate_latency().await;
        self.metadata
            .lock()
            .get(&key(token))
            .cloned()
            .ok_or_else(unreachable_node)
    }

    async fn submit_transfer(
        &self,
        _private_key: &str,
        to: &str,
        amount: &str,
    ) -> Result<String, ChainError> {
        self.submit(SubmittedTransfer {
            to: to.into(),
            amount: amount.into(),
            token: None,
        })
    }

    async fn submit_token_transfer(
        &self,
        _private_key: &str,
        token: &str,
        to: &str,
        amount: &str,
        _decimals: u8,
    ) -> Result<String, ChainError> {
        self.submit(SubmittedTransfer {
            to: to.into(),
            amount: amount.into(),
            token: Some(token.into()),
        })
    }

    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<bool>, ChainError> {
        self.receipts
            .lock()
            .get(&key(hash))
            .cloned()
            .unwrap_or(Ok(None))
    }
}
