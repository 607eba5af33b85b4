use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use url::Url;

use crate::network::{Network, NetworkRegistry};

pub const PRIVATE_KEY_ENV: &str = "EVM_UTILS_PRIVATE_KEY";
pub const SHARE_URL_ENV: &str = "EVM_UTILS_SHARE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chain id selected when no session link says otherwise
    pub default_network: Option<u64>,
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
    #[serde(default)]
    pub share: ShareConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub explorer_url: Option<String>,
}

impl From<NetworkConfig> for Network {
    fn from(config: NetworkConfig) -> Self {
        Network {
            id: config.chain_id,
            name: config.name,
            rpc_url: config.rpc_url,
            explorer_url: config.explorer_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    pub base_url: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    pub allow_write_operations: bool,
    #[serde(skip)]
    pub private_key: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_vars();
        config
    }

    fn apply_env_vars(&mut self) {
        if let Ok(key) = std::env::var(PRIVATE_KEY_ENV) {
            tracing::debug!("Using {} for write operations", PRIVATE_KEY_ENV);
            self.wallet.private_key = Some(key);
        }

        if let Ok(base_url) = std::env::var(SHARE_URL_ENV) {
            tracing::debug!("Using {} as share base URL", SHARE_URL_ENV);
            self.share.base_url = base_url;
        }
    }

    /// Built-in networks plus the configured ones. Configured ids that are
    /// zero or collide with a known network are skipped.
    pub fn network_registry(&self) -> NetworkRegistry {
        let mut registry = NetworkRegistry::new();
        for network in &self.networks {
            if network.chain_id == 0 {
                tracing::warn!(
                    "Skipping configured network {}: chain ID must be positive",
                    network.name
                );
                continue;
            }
            if let Err(e) = registry.register(network.clone().into()) {
                tracing::warn!("Skipping configured network {}: {}", network.name, e);
            }
        }
        registry
    }

    pub fn share_base_url(&self) -> Result<Url> {
        Url::parse(&self.share.base_url)
            .map_err(|e| anyhow!("Invalid share base URL '{}': {}", self.share.base_url, e))
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<std::path::PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("evm-utils").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# evm-utils configuration file

# Chain id selected by default (Citrea Testnet when omitted)
default_network = 5115

# Extra networks, registered next to the built-in Citrea chains
[[networks]]
chain_id = 31337
name = "Anvil"
rpc_url = "http://127.0.0.1:8545"

# Base URL that share links are built on
[share]
base_url = "http://localhost:5173/"

[wallet]
allow_write_operations = false

# Environment variables that can be used:
# EVM_UTILS_PRIVATE_KEY - private key used to sign write transactions
# EVM_UTILS_SHARE_URL - overrides share.base_url
"#;
        sample_config.to_string()
    }
}
