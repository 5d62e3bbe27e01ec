//! Error types for the vault, the chain client and the synchronizer.

/// Unlock failure.
///
/// A wrong password and a damaged blob are indistinguishable to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecryptError {
    #[error("wrong password or corrupted wallet data")]
    WrongPasswordOrCorrupt,
}

/// Errors surfaced by [`crate::Vault`] operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Malformed private key or mnemonic. Never reaches the network.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("password must be at least {min} characters", min = crate::vault::MIN_PASSWORD_LEN)]
    WeakPassword,

    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    #[error("wallet not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Failure talking to the chain endpoint. Always recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Local input (key, amount) rejected before anything was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("node rejected request ({code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// A transfer could not be submitted. No transaction record exists for it.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("no wallet is unlocked")]
    Locked,

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("transfer failed: {0}")]
    Chain(#[from] ChainError),
}

/// Adding a custom token failed.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("failed to save token: {0}")]
    Storage(#[from] anyhow::Error),
}
