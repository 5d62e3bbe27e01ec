//! Which node a session talks to.

use std::time::Duration;

use coffer_core::CofferConfig;

use crate::network::Network;

/// JSON-RPC endpoint resolved from application config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoint {
    pub network: Network,
    pub url: String,
    /// `url` came from `rpc_url` rather than the network's public node.
    pub is_custom: bool,
    pub timeout: Duration,
}

impl RpcEndpoint {
    /// `config.rpc_url` when set, otherwise [`Network::default_rpc_url`].
    /// A blank `rpc_url` counts as unset.
    pub fn from_config(config: &CofferConfig) -> anyhow::Result<Self> {
        let network: Network = config.network.parse()?;
        if config.rpc_timeout_secs == 0 {
            anyhow::bail!("rpc_timeout_secs must be at least 1");
        }

        let custom = config
            .rpc_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());
        let (url, is_custom) = match custom {
            Some(url) if validate_url(url) => (url.to_string(), true),
            Some(url) => anyhow::bail!("invalid RPC URL for {network}: {url}"),
            None => (network.default_rpc_url().to_string(), false),
        };

        Ok(Self {
            network,
            url,
            is_custom,
            timeout: Duration::from_secs(config.rpc_timeout_secs),
        })
    }
}

/// Whether `url` is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}
