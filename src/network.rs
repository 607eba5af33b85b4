use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DuplicateNetworkError;

/// An EVM chain the tool can talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub id: u64,
    pub name: String,
    pub rpc_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

/// Chains compiled into the binary. The first one is the default selection.
pub fn builtin_networks() -> Vec<Network> {
    vec![
        Network {
            id: 5115,
            name: "Citrea Testnet".to_string(),
            rpc_url: "https://rpc.testnet.citrea.xyz".to_string(),
            explorer_url: Some("https://explorer.testnet.citrea.xyz".to_string()),
        },
        Network {
            id: 62298,
            name: "Citrea Devnet".to_string(),
            rpc_url: "https://rpc.devnet.citrea.xyz".to_string(),
            explorer_url: Some("https://i-explorer.devnet.citrea.xyz".to_string()),
        },
    ]
}

/// Whether `id` belongs to one of the built-in chains.
pub fn is_builtin(id: u64) -> bool {
    builtin_networks().iter().any(|n| n.id == id)
}

/// Known networks, built-in ones first, then custom ones in insertion order.
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: Vec<Network>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self {
            networks: builtin_networks(),
        }
    }
}

impl NetworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a network. Does not touch whichever network is currently selected.
    pub fn register(&mut self, network: Network) -> Result<(), DuplicateNetworkError> {
        if let Some(existing) = self.lookup(network.id) {
            return Err(DuplicateNetworkError {
                id: network.id,
                existing: existing.name.clone(),
            });
        }

        info!("Registered network {} (chain ID {})", network.name, network.id);
        self.networks.push(network);
        Ok(())
    }

    pub fn lookup(&self, id: u64) -> Option<&Network> {
        self.networks.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.lookup(id).is_some()
    }

    /// True when the network must travel inside a share URL because the
    /// receiving side cannot know it by id alone.
    pub fn is_custom(&self, network: &Network) -> bool {
        !is_builtin(network.id)
    }

    pub fn default_network(&self) -> &Network {
        &self.networks[0]
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(id: u64, name: &str) -> Network {
        Network {
            id,
            name: name.to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            explorer_url: None,
        }
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = NetworkRegistry::new();
        assert_eq!(registry.default_network().id, 5115);
        assert!(registry.lookup(62298).is_some());
        assert!(registry.lookup(1).is_none());
    }

    #[test]
    fn test_register_custom_network() {
        let mut registry = NetworkRegistry::new();
        registry.register(custom(31337, "Anvil")).unwrap();

        let anvil = registry.lookup(31337).unwrap();
        assert_eq!(anvil.name, "Anvil");
        assert!(registry.is_custom(anvil));
        assert!(!registry.is_custom(registry.default_network()));
    }

    #[test]
    fn test_duplicate_network_rejected() {
        let mut registry = NetworkRegistry::new();
        registry.register(custom(31337, "Anvil")).unwrap();

        let err = registry.register(custom(31337, "Other")).unwrap_err();
        assert_eq!(err.id, 31337);
        assert_eq!(registry.lookup(31337).unwrap().name, "Anvil");
        assert_eq!(registry.networks().len(), 3);

        // Built-in ids are taken too
        assert!(registry.register(custom(5115, "Fake Citrea")).is_err());
        assert_eq!(registry.lookup(5115).unwrap().name, "Citrea Testnet");
    }

    #[test]
    fn test_network_json_shape() {
        let network = custom(31337, "Anvil");
        let json = serde_json::to_value(&network).unwrap();
        assert_eq!(json["rpcUrl"], "http://localhost:8545");
        assert!(json.get("explorerUrl").is_none());
    }
}
