//! Key material: generation, import and address derivation.

use std::fmt;

use alloy_signer_local::coins_bip39::English;
use alloy_signer_local::{LocalSignerError, MnemonicBuilder, PrivateKeySigner};
use bip39::Mnemonic;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::VaultError;

/// BIP-44 path of the first Ethereum account.
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Where a new wallet's key comes from.
pub enum KeyMaterial {
    /// Fresh 12-word mnemonic.
    Generate,
    /// Hex private key, with or without `0x`.
    PrivateKey(String),
    /// BIP-39 phrase.
    Mnemonic(String),
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Generate => f.write_str("Generate"),
            KeyMaterial::PrivateKey(_) => f.write_str("PrivateKey(<redacted>)"),
            KeyMaterial::Mnemonic(_) => f.write_str("Mnemonic(<redacted>)"),
        }
    }
}

/// Decrypted wallet payload. Zeroed on drop and never written out in the
/// clear.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WalletSecret {
    pub address: String,
    /// `0x` followed by 64 lowercase hex digits.
    pub private_key: String,
    pub mnemonic: Option<String>,
    pub name: String,
}

impl fmt::Debug for WalletSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSecret")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .finish()
    }
}

/// Checksummed address controlled by `signer`.
pub fn address_of(signer: &PrivateKeySigner) -> String {
    signer.address().to_checksum(None)
}

/// Parse a hex private key.
pub fn parse_private_key(hex_key: &str) -> Result<PrivateKeySigner, VaultError> {
    let trimmed = hex_key.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.len() != 64 {
        return Err(VaultError::InvalidKeyMaterial(
            "private key must be 32 bytes of hex".into(),
        ));
    }
    let bytes = Zeroizing::new(
        hex::decode(digits)
            .map_err(|_| VaultError::InvalidKeyMaterial("private key is not valid hex".into()))?,
    );
    PrivateKeySigner::from_slice(&bytes)
        .map_err(|_| VaultError::InvalidKeyMaterial("private key is out of range".into()))
}

/// Account at [`DEFAULT_DERIVATION_PATH`] of a validated phrase.
fn mnemonic_signer(phrase: &str) -> Result<PrivateKeySigner, VaultError> {
    let derivation_failed =
        |e: LocalSignerError| VaultError::InvalidKeyMaterial(format!("key derivation failed: {e}"));
    MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .derivation_path(DEFAULT_DERIVATION_PATH)
        .map_err(derivation_failed)?
        .build()
        .map_err(derivation_failed)
}

fn secret_from(signer: &PrivateKeySigner, mnemonic: Option<String>, name: String) -> WalletSecret {
    WalletSecret {
        address: address_of(signer),
        private_key: format!("0x{}", hex::encode(signer.to_bytes())),
        mnemonic,
        name,
    }
}

/// Turn key material into a [`WalletSecret`]. Purely local.
pub fn derive_secret(material: KeyMaterial, name: String) -> Result<WalletSecret, VaultError> {
    match material {
        KeyMaterial::Generate => {
            let entropy = Zeroizing::new(rand::random::<[u8; 16]>());
            let mnemonic = Mnemonic::from_entropy(&entropy[..])
                .map_err(|e| VaultError::InvalidKeyMaterial(e.to_string()))?;
            let phrase = Zeroizing::new(mnemonic.to_string());
            let signer = mnemonic_signer(&phrase)?;
            Ok(secret_from(&signer, Some((*phrase).clone()), name))
        }
        KeyMaterial::PrivateKey(hex_key) => {
            let hex_key = Zeroizing::new(hex_key);
            let signer = parse_private_key(&hex_key)?;
            Ok(secret_from(&signer, None, name))
        }
        KeyMaterial::Mnemonic(phrase) => {
            let phrase = Zeroizing::new(phrase);
            let normalized = Zeroizing::new(
                phrase
                    .split_whitespace()
                    .map(str::to_lowercase)
                    .collect::<Vec<_>>()
                    .join(" "),
            );
            // bip39 checks the wordlist and checksum; alloy derives the account.
            Mnemonic::parse_normalized(&normalized)
                .map_err(|e| VaultError::InvalidKeyMaterial(format!("invalid mnemonic: {e}")))?;
            let signer = mnemonic_signer(&normalized)?;
            Ok(secret_from(&signer, Some((*normalized).clone()), name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARDHAT_MNEMONIC: &str = "test test test test test test test test test test test junk";

    #[test]
    fn private_key_import_derives_checksummed_address() {
        let secret = derive_secret(
            KeyMaterial::PrivateKey(
                "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".into(),
            ),
            "Main".into(),
        )
        .unwrap();
        assert_eq!(secret.address, "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23");
        assert!(secret.mnemonic.is_none());
        assert_eq!(secret.name, "Main");
    }

    #[test]
    fn private_key_without_prefix_is_accepted() {
        let secret = derive_secret(
            KeyMaterial::PrivateKey(
                "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".into(),
            ),
            String::new(),
        )
        .unwrap();
        assert_eq!(
            secret.private_key,
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
        );
    }

    #[test]
    fn mnemonic_import_uses_first_bip44_account() {
        let secret = derive_secret(
            KeyMaterial::Mnemonic(format!("  {}  ", HARDHAT_MNEMONIC.to_uppercase())),
            "HD".into(),
        )
        .unwrap();
        assert_eq!(secret.address, "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(
            secret.private_key,
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        );
        assert_eq!(secret.mnemonic.as_deref(), Some(HARDHAT_MNEMONIC));
    }

    #[test]
    fn generated_wallet_has_twelve_word_mnemonic() {
        let secret = derive_secret(KeyMaterial::Generate, "Fresh".into()).unwrap();
        let words = secret.mnemonic.as_deref().unwrap().split(' ').count();
        assert_eq!(words, 12);

        // The phrase must reproduce the same account.
        let again =
            derive_secret(KeyMaterial::Mnemonic(secret.mnemonic.clone().unwrap()), "x".into())
                .unwrap();
        assert_eq!(again.address, secret.address);
    }

    #[test]
    fn malformed_material_is_rejected() {
        for material in [
            KeyMaterial::PrivateKey("0x1234".into()),
            KeyMaterial::PrivateKey(format!("0x{}", "zz".repeat(32))),
            KeyMaterial::PrivateKey(format!("0x{}", "00".repeat(32))),
            KeyMaterial::Mnemonic("not a real mnemonic phrase".into()),
            KeyMaterial::Mnemonic(HARDHAT_MNEMONIC.replace("junk", "junkyard")),
        ] {
            assert!(matches!(
                derive_secret(material, String::new()),
                Err(VaultError::InvalidKeyMaterial(_))
            ));
        }
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let secret = derive_secret(KeyMaterial::Generate, "Fresh".into()).unwrap();
        let debug = format!("{secret:?}");
        assert!(!debug.contains(&secret.private_key[2..]));
        assert!(debug.contains(&secret.address));
        assert!(debug.contains("<redacted>"));
    }
}
