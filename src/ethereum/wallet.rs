use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::dispatch::{ChainNegotiator, ContractCall, ContractWriter};
use crate::error::{DispatchError, SwitchChainError};
use crate::ethereum::{contract, utils};
use crate::network::Network;

#[derive(Debug, Default)]
struct WalletChains {
    known: HashMap<u64, Url>,
    active: Option<u64>,
}

/// A private-key wallet. Signs and submits write calls on its active chain
/// and only switches to chains that were added to it first.
#[derive(Debug)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
    chains: RwLock<WalletChains>,
}

impl LocalWallet {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self {
            signer,
            chains: RwLock::new(WalletChains::default()),
        }
    }

    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let private_key = private_key.trim();
        let private_key = private_key.strip_prefix("0x").unwrap_or(private_key);

        let signer = PrivateKeySigner::from_str(private_key)
            .map_err(|e| anyhow!("Invalid private key: {}", e))?;
        Ok(Self::new(signer))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub async fn active_chain(&self) -> Option<u64> {
        self.chains.read().await.active
    }

    async fn active_rpc_url(&self) -> Result<Url> {
        let chains = self.chains.read().await;
        let chain_id = chains
            .active
            .ok_or_else(|| anyhow!("Wallet is not connected to any chain"))?;
        chains
            .known
            .get(&chain_id)
            .cloned()
            .ok_or_else(|| anyhow!("Wallet has no RPC endpoint for chain {}", chain_id))
    }

    async fn send_transaction(&self, call: ContractCall<'_>) -> Result<String> {
        let address = utils::validate_address(call.contract_address)
            .map_err(|e| anyhow!("Invalid contract address: {}", e))?;
        let function = contract::to_alloy_function(&call.function.function)?;
        let encoded_input = contract::encode_function_call(&function, call.inputs)?;
        let url = self.active_rpc_url().await?;

        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(url);

        let tx_request = provider
            .transaction_request()
            .from(self.signer.address())
            .to(address)
            .input(encoded_input.into());

        info!("Sending {} to contract {:?}", function.signature(), address);

        let pending_tx = provider.send_transaction(tx_request).await.map_err(|e| {
            anyhow!(
                "Failed to send transaction: {}",
                utils::interpret_rpc_error(&e.to_string())
            )
        })?;

        Ok(format!("0x{:x}", pending_tx.tx_hash()))
    }
}

#[async_trait]
impl ContractWriter for LocalWallet {
    fn account(&self) -> Option<Address> {
        Some(self.signer.address())
    }

    async fn write(&self, call: ContractCall<'_>) -> Result<String, DispatchError> {
        Ok(self.send_transaction(call).await?)
    }
}

#[async_trait]
impl ChainNegotiator for LocalWallet {
    async fn switch_chain(&self, chain_id: u64) -> Result<(), SwitchChainError> {
        let mut chains = self.chains.write().await;
        if !chains.known.contains_key(&chain_id) {
            return Err(SwitchChainError::UnknownChain(chain_id));
        }

        debug!("Wallet switched to chain {}", chain_id);
        chains.active = Some(chain_id);
        Ok(())
    }

    async fn add_chain(&self, network: &Network) -> Result<(), SwitchChainError> {
        let url = Url::parse(&network.rpc_url).map_err(|e| {
            SwitchChainError::Other(format!("Invalid RPC URL '{}': {}", network.rpc_url, e))
        })?;

        info!("Wallet added chain {} ({})", network.name, network.id);
        self.chains.write().await.known.insert(network.id, url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known anvil development key #0
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn anvil() -> Network {
        Network {
            id: 31337,
            name: "Anvil".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            explorer_url: None,
        }
    }

    #[test]
    fn test_from_private_key() {
        let wallet = LocalWallet::from_private_key(DEV_KEY).unwrap();
        assert_eq!(
            wallet.address(),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
        assert_eq!(wallet.account(), Some(wallet.address()));

        assert!(LocalWallet::from_private_key("0x1234").is_err());
    }

    #[tokio::test]
    async fn test_switch_requires_known_chain() {
        let wallet = LocalWallet::from_private_key(DEV_KEY).unwrap();
        assert_eq!(
            wallet.switch_chain(31337).await,
            Err(SwitchChainError::UnknownChain(31337))
        );
        assert_eq!(wallet.active_chain().await, None);

        wallet.add_chain(&anvil()).await.unwrap();
        wallet.switch_chain(31337).await.unwrap();
        assert_eq!(wallet.active_chain().await, Some(31337));
    }

    #[tokio::test]
    async fn test_add_chain_rejects_bad_url() {
        let wallet = LocalWallet::from_private_key(DEV_KEY).unwrap();
        let mut broken = anvil();
        broken.rpc_url = "::nope::".to_string();
        assert!(matches!(
            wallet.add_chain(&broken).await,
            Err(SwitchChainError::Other(_))
        ));
    }
}
