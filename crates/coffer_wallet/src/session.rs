//! The unlocked-wallet session.
//!
//! A [`WalletSession`] owns the decrypted [`WalletSecret`] of the active
//! wallet, serializes every vault mutation, runs the pending-transaction
//! poller for the active address and keeps the dashboard view current.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use coffer_core::{CofferConfig, Store};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::chain::EvmClient;
use crate::endpoint::RpcEndpoint;
use crate::error::{SendError, TokenError, VaultError};
use crate::history::TransactionRecord;
use crate::keys::{KeyMaterial, WalletSecret};
use crate::network::{GasPreference, Network};
use crate::poller::{PendingPoller, PollerHandle};
use crate::sync::{Synchronizer, ZERO_BALANCE};
use crate::tokens::TokenDescriptor;
use crate::vault::{Vault, WalletRecord};

/// What the dashboard shows for the active wallet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletView {
    pub wallet: Option<WalletRecord>,
    pub native_balance: String,
    pub tokens: Vec<TokenDescriptor>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl WalletView {
    fn empty(wallet: Option<WalletRecord>) -> Self {
        Self {
            wallet,
            native_balance: ZERO_BALANCE.to_string(),
            tokens: Vec::new(),
            refreshed_at: None,
        }
    }
}

impl Default for WalletView {
    fn default() -> Self {
        Self::empty(None)
    }
}

struct ActiveWallet {
    record: WalletRecord,
    secret: Arc<WalletSecret>,
}

pub struct WalletSession {
    vault: Arc<Mutex<Vault>>,
    sync: Arc<Synchronizer>,
    network: Network,
    poll_interval: Duration,
    active: RwLock<Option<ActiveWallet>>,
    view: RwLock<WalletView>,
    poller: Mutex<Option<PollerHandle>>,
}

impl WalletSession {
    pub fn new(
        vault: Vault,
        sync: Arc<Synchronizer>,
        network: Network,
        poll_interval: Duration,
    ) -> Self {
        Self {
            vault: Arc::new(Mutex::new(vault)),
            sync,
            network,
            poll_interval,
            active: RwLock::new(None),
            view: RwLock::new(WalletView::default()),
            poller: Mutex::new(None),
        }
    }

    /// Wire a session from application config: endpoint, gas preference,
    /// timeouts and the shared store.
    ///
    /// Logging is not installed here; call [`coffer_core::init_logging`]
    /// with the same config first.
    pub fn from_config(config: &CofferConfig, store: Arc<Store>) -> anyhow::Result<Self> {
        let endpoint = RpcEndpoint::from_config(config)?;
        let gas: GasPreference = config.gas_price.parse()?;
        let client = EvmClient::from_endpoint(&endpoint, gas)?;
        info!(
            network = %endpoint.network,
            rpc = %endpoint.url,
            custom = endpoint.is_custom,
            "chain client ready"
        );

        let sync = Arc::new(Synchronizer::new(
            Arc::new(client),
            store.clone(),
            Duration::from_secs(config.pending_timeout_secs),
        ));
        Ok(Self::new(
            Vault::new(store),
            sync,
            endpoint.network,
            config.poll_interval(),
        ))
    }

    // -----------------------------------------------------------------------
    // Vault passthrough
    // -----------------------------------------------------------------------

    pub async fn is_initialized(&self) -> Result<bool, VaultError> {
        self.with_vault(|vault| vault.is_initialized()).await
    }

    pub async fn wallets(&self) -> Result<Vec<WalletRecord>, VaultError> {
        self.with_vault(|vault| vault.list()).await
    }

    /// Run a vault operation off the async runtime. Argon2 makes every
    /// encrypt/decrypt CPU-bound, and the vault lock keeps mutations in
    /// sequence.
    async fn with_vault<T, F>(&self, f: F) -> Result<T, VaultError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Vault) -> Result<T, VaultError> + Send + 'static,
    {
        let vault = self.vault.clone();
        tokio::task::spawn_blocking(move || f(&mut vault.lock()))
            .await
            .map_err(|e| VaultError::Storage(anyhow::anyhow!("vault task failed: {e}")))?
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Create or import a wallet, make it current and unlock it.
    pub async fn create_wallet(
        &self,
        material: KeyMaterial,
        name: &str,
        password: String,
    ) -> Result<WalletRecord, VaultError> {
        let name = name.to_string();
        let password = Zeroizing::new(password);
        let (record, secret) = self
            .with_vault(move |vault| {
                let record = vault.create_or_import(material, &name, &password)?;
                let secret = vault.unlock(&record.id, &password)?;
                Ok((record, secret))
            })
            .await?;
        self.activate(record.clone(), secret).await;
        Ok(record)
    }

    /// Unlock the current wallet. `Ok(None)` when the vault has no current
    /// wallet.
    pub async fn login(&self, password: String) -> Result<Option<WalletRecord>, VaultError> {
        let password = Zeroizing::new(password);
        let unlocked = self
            .with_vault(move |vault| vault.load_current(&password))
            .await?;
        match unlocked {
            Some((record, secret)) => {
                self.activate(record.clone(), secret).await;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Unlock `id` and make it current. A wrong password leaves both the
    /// current wallet and the session untouched.
    pub async fn switch_wallet(
        &self,
        id: &str,
        password: String,
    ) -> Result<WalletRecord, VaultError> {
        let id = id.to_string();
        let password = Zeroizing::new(password);
        let (record, secret) = self
            .with_vault(move |vault| {
                let secret = vault.unlock(&id, &password)?;
                vault.switch_current(&id)?;
                let record = vault
                    .get(&id)?
                    .ok_or_else(|| VaultError::NotFound(id.clone()))?;
                Ok((record, secret))
            })
            .await?;
        self.activate(record.clone(), secret).await;
        Ok(record)
    }

    /// Forget the decrypted secret and stop background polling.
    pub async fn logout(&self) {
        let previous = {
            let mut view = self.view.write();
            *view = WalletView::default();
            self.active.write().take()
        };
        self.stop_poller().await;
        if let Some(previous) = previous {
            info!(wallet_id = %previous.record.id, "session closed");
        }
    }

    async fn activate(&self, record: WalletRecord, secret: WalletSecret) {
        self.stop_poller().await;

        let address = record.address.clone();
        info!(wallet_id = %record.id, address = %address, "wallet active");
        {
            // Lock order: view, then active.
            let mut view = self.view.write();
            *view = WalletView::empty(Some(record.clone()));
            *self.active.write() = Some(ActiveWallet {
                record,
                secret: Arc::new(secret),
            });
        }

        let handle = PendingPoller::spawn(self.sync.clone(), address, self.poll_interval);
        let stale = self.poller.lock().replace(handle);
        if let Some(stale) = stale {
            stale.stop().await;
        }
    }

    async fn stop_poller(&self) {
        let handle = self.poller.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    // -----------------------------------------------------------------------
    // Active wallet
    // -----------------------------------------------------------------------

    pub fn active_wallet(&self) -> Option<WalletRecord> {
        self.active.read().as_ref().map(|a| a.record.clone())
    }

    pub fn active_address(&self) -> Option<String> {
        self.active.read().as_ref().map(|a| a.record.address.clone())
    }

    pub fn view(&self) -> WalletView {
        self.view.read().clone()
    }

    /// Re-fetch balances for the active wallet.
    ///
    /// Returns `None` if no wallet is active, or if the active wallet changed
    /// while the lookups were in flight. In that case the results are
    /// dropped and the view is left to the new wallet.
    pub async fn refresh(&self) -> Option<WalletView> {
        let wallet = self.active_wallet()?;
        let (native_balance, tokens) = tokio::join!(
            self.sync.refresh_native_balance(&wallet.address),
            self.sync.refresh_tokens(&wallet.address, self.network),
        );
        self.apply_refresh(&wallet.id, native_balance, tokens)
    }

    /// Store refreshed balances if `wallet_id` still owns the view. The
    /// check and the write happen under one view lock, which is also held
    /// whenever the active wallet changes.
    fn apply_refresh(
        &self,
        wallet_id: &str,
        native_balance: String,
        tokens: Vec<TokenDescriptor>,
    ) -> Option<WalletView> {
        let mut view = self.view.write();
        if view.wallet.as_ref().map(|w| w.id.as_str()) != Some(wallet_id) {
            debug!(wallet_id, "discarding refresh for inactive wallet");
            return None;
        }
        view.native_balance = native_balance;
        view.tokens = tokens;
        view.refreshed_at = Some(Utc::now());
        Some(view.clone())
    }

    pub async fn send(
        &self,
        to: &str,
        amount: &str,
        token: Option<&TokenDescriptor>,
    ) -> Result<TransactionRecord, SendError> {
        let secret = self
            .active
            .read()
            .as_ref()
            .map(|a| a.secret.clone())
            .ok_or(SendError::Locked)?;
        self.sync.send(&secret, to, amount, token).await
    }

    pub async fn add_custom_token(&self, address: &str) -> Result<TokenDescriptor, TokenError> {
        self.sync.add_custom_token(address).await
    }

    /// Transactions sent from the active wallet, newest first.
    pub fn history(&self) -> anyhow::Result<Vec<TransactionRecord>> {
        match self.active_address() {
            Some(address) => self.sync.get_history(&address),
            None => Ok(Vec::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Registry edits
    // -----------------------------------------------------------------------

    pub async fn rename(&self, id: &str, new_name: &str) -> Result<WalletRecord, VaultError> {
        let (id, new_name) = (id.to_string(), new_name.to_string());
        let renamed = self
            .with_vault(move |vault| vault.rename(&id, &new_name))
            .await?;

        let mut view = self.view.write();
        if let Some(active) = self.active.write().as_mut() {
            if active.record.id == renamed.id {
                active.record = renamed.clone();
                view.wallet = Some(renamed.clone());
            }
        }
        Ok(renamed)
    }

    /// Delete a wallet. Deleting the active one ends the session, since the
    /// wallet the pointer moves to has not been unlocked.
    pub async fn delete(&self, id: &str) -> Result<Vec<WalletRecord>, VaultError> {
        let target = id.to_string();
        let remaining = self
            .with_vault(move |vault| vault.delete(&target))
            .await?;

        let was_active = self
            .active
            .read()
            .as_ref()
            .is_some_and(|a| a.record.id == id);
        if was_active {
            self.logout().await;
        }
        Ok(remaining)
    }
}
