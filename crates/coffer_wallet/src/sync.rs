//! Chain-state synchronizer: balances, token discovery and the transaction
//! lifecycle for one network.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use coffer_core::Store;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::asset::Asset;
use crate::chain::ChainClient;
use crate::chain::address::checksummed;
use crate::chain::evm::DEFAULT_TOKEN_DECIMALS;
use crate::chain::units::{to_base_units, to_display};
use crate::error::{ChainError, SendError, TokenError};
use crate::history::{TransactionLog, TransactionRecord, TxOutcome};
use crate::keys::WalletSecret;
use crate::network::Network;
use crate::tokens::{CustomToken, CustomTokenList, TokenCandidate, TokenDescriptor, merge_candidates};

/// Shown when a balance cannot be fetched.
pub const ZERO_BALANCE: &str = "0.0";

pub struct Synchronizer {
    client: Arc<dyn ChainClient>,
    custom_tokens: CustomTokenList,
    log: TransactionLog,
    pending_timeout: Duration,
}

impl Synchronizer {
    pub fn new(client: Arc<dyn ChainClient>, store: Arc<Store>, pending_timeout: Duration) -> Self {
        Self {
            client,
            custom_tokens: CustomTokenList::new(store.clone()),
            log: TransactionLog::new(store),
            pending_timeout,
        }
    }

    // -----------------------------------------------------------------------
    // Balances
    // -----------------------------------------------------------------------

    /// Native balance, or `"0.0"` if the node cannot be reached.
    pub async fn refresh_native_balance(&self, address: &str) -> String {
        match Asset::Native.balance_of(self.client.as_ref(), address).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(address, error = %e, "native balance unavailable, showing zero");
                ZERO_BALANCE.to_string()
            }
        }
    }

    /// Well-known tokens for `network` plus the user's custom tokens, one
    /// descriptor per contract address.
    ///
    /// Lookups run concurrently. A token whose balance cannot be fetched is
    /// still listed, with a zero balance.
    pub async fn refresh_tokens(&self, address: &str, network: Network) -> Vec<TokenDescriptor> {
        let custom = self.custom_tokens.list().unwrap_or_else(|e| {
            error!(error = %e, "failed to load custom tokens");
            Vec::new()
        });
        let candidates = merge_candidates(network, &custom);
        debug!(
            address,
            network = %network,
            candidates = candidates.len(),
            "refreshing token balances"
        );

        join_all(
            candidates
                .into_iter()
                .map(|candidate| self.lookup_token(candidate, address)),
        )
        .await
    }

    async fn lookup_token(&self, candidate: TokenCandidate, owner: &str) -> TokenDescriptor {
        let (balance, decimals) = tokio::join!(
            self.client.get_token_balance(&candidate.address, owner),
            self.client.get_token_decimals(&candidate.address),
        );

        let decimals = decimals.unwrap_or_else(|e| {
            debug!(token = %candidate.address, error = %e, "decimals unavailable, using fallback");
            candidate.decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS)
        });
        let balance = match balance.and_then(|raw| {
            to_display(raw, decimals).map_err(ChainError::InvalidResponse)
        }) {
            Ok(balance) => balance,
            Err(e) => {
                warn!(token = %candidate.address, error = %e, "token balance unavailable");
                ZERO_BALANCE.to_string()
            }
        };

        TokenDescriptor {
            address: candidate.address,
            symbol: candidate.symbol,
            name: candidate.name,
            decimals,
            balance,
        }
    }

    /// Fetch metadata for `address` and remember it as a custom token.
    /// Adding an address twice updates the stored entry.
    pub async fn add_custom_token(&self, address: &str) -> Result<TokenDescriptor, TokenError> {
        let address = checksummed(address)?;
        let metadata = self.client.get_token_metadata(&address).await?;

        self.custom_tokens.upsert(CustomToken {
            address: address.clone(),
            symbol: metadata.symbol.clone(),
            name: metadata.name.clone(),
            decimals: metadata.decimals,
        })?;

        Ok(TokenDescriptor {
            address,
            symbol: metadata.symbol,
            name: metadata.name,
            decimals: metadata.decimals,
            balance: ZERO_BALANCE.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Submit a transfer from `secret`'s address and log it as pending.
    ///
    /// Nothing is logged unless the node returned a hash. Once it has, the
    /// transfer is reported as sent even if writing the log entry fails.
    pub async fn send(
        &self,
        secret: &WalletSecret,
        to: &str,
        amount: &str,
        token: Option<&TokenDescriptor>,
    ) -> Result<TransactionRecord, SendError> {
        let to = checksummed(to).map_err(|_| SendError::InvalidRecipient(to.to_string()))?;
        let asset = Asset::from_token(token);
        let amount = amount.trim();
        match to_base_units(amount, asset.decimals()) {
            Ok(units) if units.is_zero() => {
                return Err(SendError::InvalidAmount("amount must be positive".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(SendError::InvalidAmount(e)),
        }

        let hash = asset
            .transfer(self.client.as_ref(), &secret.private_key, &to, amount)
            .await
            .inspect_err(|e| {
                warn!(from = %secret.address, to = %to, asset = asset.symbol(), error = %e, "transfer rejected");
            })?;

        let record = TransactionRecord::pending(
            hash,
            secret.address.clone(),
            to,
            amount.to_string(),
            asset.contract().map(str::to_string),
        );
        if let Err(e) = self.log.record_pending(record.clone()) {
            error!(tx_hash = %record.hash, error = %e, "transaction sent but could not be logged");
        }
        info!(
            tx_hash = %record.hash,
            from = %record.from,
            to = %record.to,
            value = %record.value,
            asset = asset.symbol(),
            "transfer submitted"
        );
        Ok(record)
    }

    /// Check receipts for every pending transaction of `address` and settle
    /// the ones that finished. Returns how many records changed.
    ///
    /// A receipt lookup error leaves the record pending for the next round.
    /// A transaction still unmined after the pending timeout is marked
    /// failed.
    pub async fn poll_pending(&self, address: &str) -> anyhow::Result<usize> {
        let pending = self.log.pending(address)?;
        if pending.is_empty() {
            return Ok(0);
        }

        let receipts = join_all(
            pending
                .iter()
                .map(|record| self.client.get_transaction_receipt(&record.hash)),
        )
        .await;

        let now = Utc::now();
        let outcomes: Vec<(String, TxOutcome)> = pending
            .into_iter()
            .zip(receipts)
            .filter_map(|(record, receipt)| {
                let outcome = match receipt {
                    Ok(Some(true)) => TxOutcome::Success,
                    Ok(Some(false)) => TxOutcome::Failed("transaction reverted".into()),
                    Ok(None) => {
                        let age = (now - record.timestamp).to_std().unwrap_or_default();
                        if age < self.pending_timeout {
                            return None;
                        }
                        TxOutcome::Failed(format!(
                            "not mined within {}s",
                            self.pending_timeout.as_secs()
                        ))
                    }
                    Err(e) => {
                        debug!(tx_hash = %record.hash, error = %e, "receipt lookup failed");
                        return None;
                    }
                };
                Some((record.hash, outcome))
            })
            .collect();

        self.log.resolve_many(address, outcomes)
    }

    /// Transactions sent from `address`, newest first.
    pub fn get_history(&self, address: &str) -> anyhow::Result<Vec<TransactionRecord>> {
        self.log.history(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    use crate::chain::mock::MockChain;
    use crate::history::TxStatus;
    use crate::keys::{KeyMaterial, derive_secret};
    use crate::tokens::well_known_tokens;

    const OWNER: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";
    const RECIPIENT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const CUSTOM: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn setup() -> (Arc<MockChain>, Synchronizer) {
        setup_with_timeout(Duration::from_secs(3600))
    }

    fn setup_with_timeout(timeout: Duration) -> (Arc<MockChain>, Synchronizer) {
        let chain = Arc::new(MockChain::new());
        let store = Arc::new(Store::open_in_memory().unwrap());
        let sync = Synchronizer::new(chain.clone(), store, timeout);
        (chain, sync)
    }

    fn secret() -> WalletSecret {
        derive_secret(
            KeyMaterial::PrivateKey(
                "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".into(),
            ),
            "Main".into(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn native_balance_falls_back_to_zero() {
        let (chain, sync) = setup();
        assert_eq!(sync.refresh_native_balance(OWNER).await, "0.0");

        chain.set_native(OWNER, "1.25");
        assert_eq!(sync.refresh_native_balance(OWNER).await, "1.25");
    }

    #[tokio::test]
    async fn token_failures_are_isolated() {
        let (chain, sync) = setup();
        let [link, dai, uni] = [0, 1, 2].map(|i| well_known_tokens(Network::Sepolia)[i].address);
        chain.set_token_balance(link, U256::from(2_500_000_000_000_000_000u128));
        chain.set_decimals(link, 18);
        chain.fail_token(dai);
        chain.set_token_balance(uni, U256::from(1_500_000u64));
        chain.set_decimals(uni, 6);

        let tokens = sync.refresh_tokens(OWNER, Network::Sepolia).await;

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].symbol, "LINK");
        assert_eq!(tokens[0].balance, "2.5");
        assert_eq!(tokens[1].balance, "0.0");
        // No decimals answer: falls back to 18.
        assert_eq!(tokens[1].decimals, 18);
        assert_eq!(tokens[2].balance, "1.5");
        assert_eq!(tokens[2].decimals, 6);
    }

    #[tokio::test]
    async fn balances_beyond_u128_are_shown_exactly() {
        let (chain, sync) = setup();
        let link = well_known_tokens(Network::Sepolia)[0].address;
        chain.set_token_balance(link, U256::from(1u8) << 128);
        chain.set_decimals(link, 18);

        let tokens = sync.refresh_tokens(OWNER, Network::Sepolia).await;

        assert_eq!(tokens[0].symbol, "LINK");
        assert_eq!(tokens[0].balance, "340282366920938463463.374607431768211456");
    }

    #[tokio::test]
    async fn max_uint256_balance_is_not_zeroed() {
        let (chain, sync) = setup();
        let link = well_known_tokens(Network::Sepolia)[0].address;
        chain.set_token_balance(link, U256::MAX);
        chain.set_decimals(link, 0);

        let tokens = sync.refresh_tokens(OWNER, Network::Sepolia).await;

        assert_eq!(tokens[0].balance, format!("{}.0", U256::MAX));
    }

    #[tokio::test]
    async fn well_known_entry_wins_over_custom_duplicate() {
        let (chain, sync) = setup();
        let link = well_known_tokens(Network::Sepolia)[0].address;
        chain.set_metadata(&link.to_lowercase(), "FAKE", "Fake Link", 18);
        sync.add_custom_token(&link.to_lowercase()).await.unwrap();

        let tokens = sync.refresh_tokens(OWNER, Network::Sepolia).await;

        let matching: Vec<_> = tokens
            .iter()
            .filter(|t| t.address.eq_ignore_ascii_case(link))
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].symbol, "LINK");
        assert_eq!(tokens.len(), well_known_tokens(Network::Sepolia).len());
    }

    #[tokio::test]
    async fn custom_tokens_follow_well_known_ones() {
        let (chain, sync) = setup();
        chain.set_metadata(CUSTOM, "CST", "Custom", 8);
        chain.set_token_balance(CUSTOM, U256::from(12_345_000_000u64));

        let added = sync.add_custom_token(CUSTOM).await.unwrap();
        assert_eq!(added.symbol, "CST");
        assert_eq!(added.decimals, 8);

        let tokens = sync.refresh_tokens(OWNER, Network::Goerli).await;
        let last = tokens.last().unwrap();
        assert_eq!(last.symbol, "CST");
        // Decimals call fails in the mock, so the stored value is used.
        assert_eq!(last.decimals, 8);
        assert_eq!(last.balance, "123.45");
    }

    #[tokio::test]
    async fn token_lookups_run_concurrently() {
        let (chain, sync) = setup();
        chain.set_latency(Duration::from_millis(100));

        let started = std::time::Instant::now();
        let tokens = sync.refresh_tokens(OWNER, Network::Sepolia).await;

        assert_eq!(tokens.len(), 3);
        // Three tokens with two calls each would take 600ms sequentially.
        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(chain.max_in_flight() >= 3);
    }

    #[tokio::test]
    async fn add_custom_token_is_idempotent() {
        let (chain, sync) = setup();
        chain.set_metadata(CUSTOM, "CST", "Custom", 8);
        sync.add_custom_token(CUSTOM).await.unwrap();

        chain.set_metadata(CUSTOM, "CST2", "Custom v2", 8);
        sync.add_custom_token(&CUSTOM.to_lowercase()).await.unwrap();

        let custom = sync.custom_tokens.list().unwrap();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0].symbol, "CST2");
    }

    #[tokio::test]
    async fn add_custom_token_rejects_bad_address_and_chain_errors() {
        let (_chain, sync) = setup();
        assert!(matches!(
            sync.add_custom_token("0x1234").await,
            Err(TokenError::Chain(ChainError::InvalidAddress(_)))
        ));
        assert!(matches!(
            sync.add_custom_token(CUSTOM).await,
            Err(TokenError::Chain(ChainError::Transport(_)))
        ));
        assert!(sync.custom_tokens.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_send_leaves_no_record() {
        let (chain, sync) = setup();
        chain.fail_submissions(ChainError::Rpc {
            code: -32000,
            message: "insufficient funds for gas".into(),
        });
        let secret = secret();

        let result = sync.send(&secret, RECIPIENT, "0.5", None).await;

        assert!(matches!(result, Err(SendError::Chain(ChainError::Rpc { .. }))));
        assert!(sync.get_history(&secret.address).unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_validates_before_submitting() {
        let (chain, sync) = setup();
        let secret = secret();

        assert!(matches!(
            sync.send(&secret, "0xnope", "1", None).await,
            Err(SendError::InvalidRecipient(_))
        ));
        for amount in ["", "-1", "abc", "0", "0.0000000000000000001"] {
            assert!(matches!(
                sync.send(&secret, RECIPIENT, amount, None).await,
                Err(SendError::InvalidAmount(_))
            ));
        }
        assert!(chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn successful_send_records_pending_then_resolves() {
        let (chain, sync) = setup();
        let secret = secret();

        let record = sync.send(&secret, RECIPIENT, "0.25", None).await.unwrap();
        assert_eq!(record.status, TxStatus::Pending);
        assert_eq!(record.from, secret.address);
        assert_eq!(record.to, RECIPIENT);
        assert_eq!(record.value, "0.25");

        let history = sync.get_history(&secret.address).unwrap();
        assert_eq!(history, vec![record.clone()]);

        // Not mined yet.
        assert_eq!(sync.poll_pending(&secret.address).await.unwrap(), 0);

        chain.set_receipt(&record.hash, Some(true));
        assert_eq!(sync.poll_pending(&secret.address).await.unwrap(), 1);
        let resolved = &sync.get_history(&secret.address).unwrap()[0];
        assert_eq!(resolved.status, TxStatus::Success);
        assert_eq!(resolved.error_message, None);

        // Terminal: a later contradicting receipt changes nothing.
        chain.set_receipt(&record.hash, Some(false));
        assert_eq!(sync.poll_pending(&secret.address).await.unwrap(), 0);
        assert_eq!(
            sync.get_history(&secret.address).unwrap()[0].status,
            TxStatus::Success
        );
    }

    #[tokio::test]
    async fn reverted_transaction_gets_error_message() {
        let (chain, sync) = setup();
        let secret = secret();
        let record = sync.send(&secret, RECIPIENT, "1", None).await.unwrap();

        chain.set_receipt(&record.hash, Some(false));
        sync.poll_pending(&secret.address).await.unwrap();

        let resolved = &sync.get_history(&secret.address).unwrap()[0];
        assert_eq!(resolved.status, TxStatus::Failed);
        assert_eq!(resolved.error_message.as_deref(), Some("transaction reverted"));
    }

    #[tokio::test]
    async fn receipt_errors_keep_record_pending() {
        let (chain, sync) = setup_with_timeout(Duration::ZERO);
        let secret = secret();
        let record = sync.send(&secret, RECIPIENT, "1", None).await.unwrap();

        chain.fail_receipt(&record.hash);
        assert_eq!(sync.poll_pending(&secret.address).await.unwrap(), 0);
        assert_eq!(
            sync.get_history(&secret.address).unwrap()[0].status,
            TxStatus::Pending
        );
    }

    #[tokio::test]
    async fn unmined_transaction_fails_after_timeout() {
        let (_chain, sync) = setup_with_timeout(Duration::ZERO);
        let secret = secret();
        sync.send(&secret, RECIPIENT, "1", None).await.unwrap();

        assert_eq!(sync.poll_pending(&secret.address).await.unwrap(), 1);
        let resolved = &sync.get_history(&secret.address).unwrap()[0];
        assert_eq!(resolved.status, TxStatus::Failed);
        assert!(resolved.error_message.as_deref().unwrap().contains("not mined"));
    }

    #[tokio::test]
    async fn token_send_goes_through_token_transfer() {
        let (chain, sync) = setup();
        let secret = secret();
        let token = TokenDescriptor {
            address: CUSTOM.into(),
            symbol: "CST".into(),
            name: "Custom".into(),
            decimals: 2,
            balance: "10.0".into(),
        };

        let record = sync
            .send(&secret, &RECIPIENT.to_lowercase(), "1.25", Some(&token))
            .await
            .unwrap();

        assert_eq!(record.token.as_deref(), Some(CUSTOM));
        assert_eq!(record.to, RECIPIENT);
        let submitted = chain.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].token.as_deref(), Some(CUSTOM));

        // More precision than the token supports.
        assert!(matches!(
            sync.send(&secret, RECIPIENT, "0.001", Some(&token)).await,
            Err(SendError::InvalidAmount(_))
        ));
    }
}
