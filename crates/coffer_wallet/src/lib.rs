pub mod asset;
pub mod chain;
pub mod cipher;
pub mod endpoint;
pub mod error;
pub mod history;
pub mod keys;
pub mod network;
pub mod poller;
pub mod session;
pub mod sync;
pub mod tokens;
pub mod vault;

pub use asset::Asset;
pub use chain::{ChainClient, EvmClient, TokenMetadata};
pub use endpoint::RpcEndpoint;
pub use error::{ChainError, DecryptError, SendError, TokenError, VaultError};
pub use history::{TransactionLog, TransactionRecord, TxOutcome, TxStatus};
pub use keys::{KeyMaterial, WalletSecret};
pub use network::{GasPreference, Network};
pub use poller::{PendingPoller, PollerHandle};
pub use session::{WalletSession, WalletView};
pub use sync::Synchronizer;
pub use tokens::{CustomToken, TokenDescriptor, well_known_tokens};
pub use vault::{Vault, WalletRecord};
