//! Password-based authenticated encryption of opaque payloads.
//!
//! Blob layout: `version (1) || salt (16) || nonce (12) || ciphertext+tag`.
//! The key is derived per blob with Argon2id over a random salt, so the same
//! password never yields the same key twice.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use anyhow::Result;
use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::error::DecryptError;

const BLOB_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const AES_NONCE_LEN: usize = 12;
const HEADER_LEN: usize = 1 + SALT_LEN + AES_NONCE_LEN;

/// Derive a 256-bit AES key from a password using Argon2id.
///
/// Parameters: m=19456 KiB (~19 MB), t=2, p=1.
fn derive_key(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let params = Params::new(19_456, 2, 1, Some(32))
        .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut *key)
        .map_err(|e| anyhow::anyhow!("argon2 key derivation failed: {e}"))?;
    Ok(key)
}

/// Encrypt `plaintext` using AES-256-GCM with a key derived from `password`.
///
/// CPU-bound (Argon2). Async callers run it on `spawn_blocking`.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
    let salt: [u8; SALT_LEN] = rand::random();
    let nonce_bytes: [u8; AES_NONCE_LEN] = rand::random();

    let key_bytes = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes[..]));

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| anyhow::anyhow!("encryption failed: {e}"))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    blob.push(BLOB_VERSION);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Truncation, an unknown version, tampering and a wrong password all map to
/// [`DecryptError::WrongPasswordOrCorrupt`].
pub fn decrypt(blob: &[u8], password: &str) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    if blob.len() <= HEADER_LEN || blob[0] != BLOB_VERSION {
        return Err(DecryptError::WrongPasswordOrCorrupt);
    }

    let (salt, rest) = blob[1..].split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(AES_NONCE_LEN);

    let key_bytes =
        derive_key(password, salt).map_err(|_| DecryptError::WrongPasswordOrCorrupt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes[..]));

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| DecryptError::WrongPasswordOrCorrupt)
}
