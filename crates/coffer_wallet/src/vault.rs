use std::sync::Arc;

use chrono::{DateTime, Utc};
use coffer_core::{KvWrite, Store};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::cipher;
use crate::error::{DecryptError, VaultError};
use crate::keys::{self, KeyMaterial, WalletSecret};

pub const MIN_PASSWORD_LEN: usize = 8;

const REGISTRY_KEY: &str = "vault.registry";
const CURRENT_KEY: &str = "vault.current";
const INITIALIZED_KEY: &str = "vault.initialized";

fn blob_key(id: &str) -> String {
    format!("vault.blob.{id}")
}

/// Unencrypted registry entry for one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: String,
    pub address: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Display name used when the user leaves the name blank.
pub fn default_wallet_name() -> String {
    format!("Wallet {}", Utc::now().format("%Y-%m-%d"))
}

fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        default_wallet_name()
    } else {
        trimmed.to_string()
    }
}

/// Password-protected store of wallet secrets plus the plaintext registry
/// and current-wallet pointer.
///
/// Mutating methods take `&mut self`; callers that share a vault wrap it in a
/// mutex so mutations never interleave. Encryption and decryption run
/// Argon2 and are CPU-bound.
pub struct Vault {
    store: Arc<Store>,
}

impl Vault {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Registry in creation order.
    pub fn list(&self) -> Result<Vec<WalletRecord>, VaultError> {
        Ok(self
            .store
            .get_json::<Vec<WalletRecord>>(REGISTRY_KEY)?
            .unwrap_or_default())
    }

    pub fn get(&self, id: &str) -> Result<Option<WalletRecord>, VaultError> {
        Ok(self.list()?.into_iter().find(|w| w.id == id))
    }

    /// The current-wallet pointer, ignored if it names a wallet that is no
    /// longer registered.
    pub fn current_wallet_id(&self) -> Result<Option<String>, VaultError> {
        Ok(self.current()?.map(|w| w.id))
    }

    pub fn current(&self) -> Result<Option<WalletRecord>, VaultError> {
        match self.store.get(CURRENT_KEY)? {
            Some(id) => self.get(&id),
            None => Ok(None),
        }
    }

    /// Whether a wallet has been created and at least one is still
    /// registered. False sends the user to the wallet-creation flow.
    pub fn is_initialized(&self) -> Result<bool, VaultError> {
        let flag = self.store.get(INITIALIZED_KEY)?.as_deref() == Some("true");
        Ok(flag && !self.list()?.is_empty())
    }

    // -----------------------------------------------------------------------
    // Create / import
    // -----------------------------------------------------------------------

    /// Derive a wallet from `material`, encrypt it under `password` and make
    /// it current.
    pub fn create_or_import(
        &mut self,
        material: KeyMaterial,
        name: &str,
        password: &str,
    ) -> Result<WalletRecord, VaultError> {
        check_password(password)?;
        let secret = keys::derive_secret(material, normalize_name(name))?;
        self.save_secret(None, &secret, password)
    }

    /// Encrypt and persist an already-derived secret, then make it current.
    ///
    /// With `id` naming a registered wallet the entry is updated in place:
    /// `created_at` is kept and the address must not change. Otherwise a
    /// new entry is appended, under `id` if given or a fresh UUID.
    pub fn save_secret(
        &mut self,
        id: Option<&str>,
        secret: &WalletSecret,
        password: &str,
    ) -> Result<WalletRecord, VaultError> {
        check_password(password)?;
        let mut registry = self.list()?;
        let name = normalize_name(&secret.name);

        let record = match id.and_then(|id| registry.iter_mut().find(|w| w.id == id)) {
            Some(existing) => {
                if !existing.address.eq_ignore_ascii_case(&secret.address) {
                    return Err(VaultError::InvalidKeyMaterial(format!(
                        "wallet {} holds {}, not {}",
                        existing.id, existing.address, secret.address
                    )));
                }
                existing.name = name;
                existing.clone()
            }
            None => {
                let record = WalletRecord {
                    id: id
                        .map(str::to_string)
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    address: secret.address.clone(),
                    name,
                    created_at: Utc::now(),
                };
                registry.push(record.clone());
                record
            }
        };

        let plaintext = Zeroizing::new(
            serde_json::to_vec(secret)
                .map_err(|e| anyhow::anyhow!("failed to serialize wallet secret: {e}"))?,
        );
        let blob = cipher::encrypt(&plaintext, password)?;

        self.store
            .apply(&save_writes(&record.id, &blob, &registry)?)?;
        info!(
            wallet_id = %record.id,
            address = %record.address,
            wallets = registry.len(),
            "wallet saved"
        );
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Unlock
    // -----------------------------------------------------------------------

    /// Decrypt a wallet. Does not change the current wallet.
    pub fn unlock(&self, id: &str, password: &str) -> Result<WalletSecret, VaultError> {
        let record = self
            .get(id)?
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;

        let Some(blob_hex) = self.store.get(&blob_key(id))? else {
            warn!(wallet_id = %id, "registered wallet has no encrypted blob");
            return Err(DecryptError::WrongPasswordOrCorrupt.into());
        };
        let blob = hex::decode(blob_hex).map_err(|_| DecryptError::WrongPasswordOrCorrupt)?;
        let plaintext = cipher::decrypt(&blob, password)?;
        let secret: WalletSecret =
            serde_json::from_slice(&plaintext).map_err(|_| DecryptError::WrongPasswordOrCorrupt)?;

        if !secret.address.eq_ignore_ascii_case(&record.address) {
            warn!(wallet_id = %id, "decrypted wallet does not match registry address");
            return Err(DecryptError::WrongPasswordOrCorrupt.into());
        }
        info!(wallet_id = %id, "wallet unlocked");
        Ok(secret)
    }

    /// Unlock whichever wallet is current, if any.
    pub fn load_current(
        &self,
        password: &str,
    ) -> Result<Option<(WalletRecord, WalletSecret)>, VaultError> {
        let Some(record) = self.current()? else {
            return Ok(None);
        };
        let secret = self.unlock(&record.id, password)?;
        Ok(Some((record, secret)))
    }

    // -----------------------------------------------------------------------
    // Registry edits
    // -----------------------------------------------------------------------

    pub fn switch_current(&mut self, id: &str) -> Result<(), VaultError> {
        if self.get(id)?.is_none() {
            return Err(VaultError::NotFound(id.to_string()));
        }
        self.store.put(CURRENT_KEY, id)?;
        info!(wallet_id = %id, "current wallet switched");
        Ok(())
    }

    /// Change the display name. The encrypted payload is left alone.
    pub fn rename(&mut self, id: &str, new_name: &str) -> Result<WalletRecord, VaultError> {
        let mut registry = self.list()?;
        let record = registry
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
        record.name = normalize_name(new_name);
        let renamed = record.clone();

        self.store.put_json(REGISTRY_KEY, &registry)?;
        info!(wallet_id = %id, name = %renamed.name, "wallet renamed");
        Ok(renamed)
    }

    /// Remove a wallet and return the remaining registry.
    ///
    /// Deleting the current wallet moves the pointer to the first remaining
    /// entry. Deleting the last wallet clears both the pointer and the
    /// initialized flag. An unknown id changes nothing.
    pub fn delete(&mut self, id: &str) -> Result<Vec<WalletRecord>, VaultError> {
        let mut registry = self.list()?;
        let before = registry.len();
        registry.retain(|w| w.id != id);
        if registry.len() == before {
            warn!(wallet_id = %id, "delete requested for unknown wallet");
            return Ok(registry);
        }

        let was_current = self.store.get(CURRENT_KEY)?.as_deref() == Some(id);
        let mut writes = vec![KvWrite::put_json(REGISTRY_KEY, &registry)?];
        match registry.first() {
            Some(next) if was_current => writes.push(KvWrite::put(CURRENT_KEY, next.id.clone())),
            Some(_) => {}
            None => {
                writes.push(KvWrite::delete(CURRENT_KEY));
                writes.push(KvWrite::delete(INITIALIZED_KEY));
            }
        }
        writes.push(KvWrite::delete(blob_key(id)));

        self.store.apply(&writes)?;
        info!(
            wallet_id = %id,
            remaining = registry.len(),
            was_current,
            "wallet deleted"
        );
        Ok(registry)
    }
}

fn check_password(password: &str) -> Result<(), VaultError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(VaultError::WeakPassword);
    }
    Ok(())
}

/// Writes for persisting one wallet, in the order blob, registry, pointer,
/// flag. Applied as a single batch.
fn save_writes(
    id: &str,
    blob: &[u8],
    registry: &[WalletRecord],
) -> anyhow::Result<Vec<KvWrite>> {
    Ok(vec![
        KvWrite::put(blob_key(id), hex::encode(blob)),
        KvWrite::put_json(REGISTRY_KEY, &registry)?,
        KvWrite::put(CURRENT_KEY, id),
        KvWrite::put(INITIALIZED_KEY, "true"),
    ])
}
