use crate::chain::ChainClient;
use crate::chain::units::to_display;
use crate::error::ChainError;
use crate::tokens::TokenDescriptor;

/// Something a wallet can hold and send: the network's native coin or an
/// ERC-20 token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    Native,
    Token(TokenDescriptor),
}

impl Asset {
    pub fn from_token(token: Option<&TokenDescriptor>) -> Self {
        token.cloned().map_or(Asset::Native, Asset::Token)
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Asset::Native => 18,
            Asset::Token(token) => token.decimals,
        }
    }

    /// Contract address, `None` for the native coin.
    pub fn contract(&self) -> Option<&str> {
        match self {
            Asset::Native => None,
            Asset::Token(token) => Some(&token.address),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Asset::Native => "ETH",
            Asset::Token(token) => &token.symbol,
        }
    }

    /// Balance of `owner` as a human decimal string.
    pub async fn balance_of(
        &self,
        client: &dyn ChainClient,
        owner: &str,
    ) -> Result<String, ChainError> {
        match self {
            Asset::Native => client.get_native_balance(owner).await,
            Asset::Token(token) => {
                let raw = client.get_token_balance(&token.address, owner).await?;
                to_display(raw, token.decimals).map_err(ChainError::InvalidResponse)
            }
        }
    }

    /// Submit a transfer of `amount` (human decimal) and return its hash.
    pub async fn transfer(
        &self,
        client: &dyn ChainClient,
        private_key: &str,
        to: &str,
        amount: &str,
    ) -> Result<String, ChainError> {
        match self {
            Asset::Native => client.submit_transfer(private_key, to, amount).await,
            Asset::Token(token) => {
                client
                    .submit_token_transfer(private_key, &token.address, to, amount, token.decimals)
                    .await
            }
        }
    }
}
