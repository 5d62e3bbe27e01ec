use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Application configuration stored at `~/.coffer/config.json`.
///
/// Nothing secret lives here. Wallet key material is only ever persisted
/// encrypted, inside the store at [`CofferConfig::db_path`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CofferConfig {
    // Chain endpoint
    pub network: String,
    pub rpc_url: Option<String>,
    pub rpc_timeout_secs: u64,

    // Transaction tracking
    pub poll_interval_secs: u64,
    pub pending_timeout_secs: u64,

    // Fees: "low", "medium" or "high"
    pub gas_price: String,

    // General
    pub log_level: String,
}

impl Default for CofferConfig {
    fn default() -> Self {
        Self {
            network: "sepolia".into(),
            rpc_url: None,
            rpc_timeout_secs: 30,
            poll_interval_secs: 5,
            pending_timeout_secs: 3600,
            gas_price: "medium".into(),
            log_level: "info".into(),
        }
    }
}

impl CofferConfig {
    /// Returns the base config directory: `~/.coffer/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".coffer"))
    }

    /// Returns the config file path: `~/.coffer/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.coffer/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Returns the wallet database path: `~/.coffer/wallet.db`
    pub fn db_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("wallet.db"))
    }

    /// Ensures all required directories exist.
    pub fn ensure_dirs() -> Result<()> {
        for dir in [Self::base_dir()?, Self::logs_dir()?] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Loads config from disk, or creates the default if missing.
    pub fn load() -> Result<Self> {
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        Self::load_from_path(&path)
    }

    /// Load config from a specific file path, writing defaults there if the
    /// file does not exist yet.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self =
                serde_json::from_str(&content).with_context(|| "Failed to parse config.json")?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    /// Saves config to `~/.coffer/config.json`.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to_path(&path)
    }

    /// Save config to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Poll interval as a [`std::time::Duration`].
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
