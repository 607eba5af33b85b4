use alloy::{
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::TransactionRequest,
    transports::http::{Client, Http},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::dispatch::{ContractCall, ContractReader};
use crate::error::DispatchError;
use crate::ethereum::{contract, utils};
use crate::network::Network;

/// Read capability over a network's public JSON-RPC endpoint.
#[derive(Debug)]
pub struct RpcReader {
    provider: RootProvider<Http<Client>>,
    network: Network,
}

impl RpcReader {
    pub fn new(network: &Network) -> Result<Self> {
        let url = network
            .rpc_url
            .parse()
            .map_err(|e| anyhow!("Invalid RPC URL '{}': {}", network.rpc_url, e))?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            provider,
            network: network.clone(),
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub async fn check_connection(&self) -> bool {
        match self.provider.get_block_number().await {
            Ok(_) => true,
            Err(e) => {
                debug!("Connection check failed for {}: {}", self.network.name, e);
                false
            }
        }
    }

    async fn call_function(&self, call: ContractCall<'_>) -> Result<Value> {
        let address = utils::validate_address(call.contract_address)
            .map_err(|e| anyhow!("Invalid contract address: {}", e))?;
        let function = contract::to_alloy_function(&call.function.function)?;
        let calldata = contract::encode_function_call(&function, call.inputs)?;

        let call_request = TransactionRequest::default()
            .to(address)
            .input(calldata.into());

        let result_bytes = self
            .provider
            .call(&call_request)
            .await
            .map_err(|e| anyhow!(utils::interpret_rpc_error(&e.to_string())))?;

        contract::decode_function_result(&function, &result_bytes)
    }
}

#[async_trait]
impl ContractReader for RpcReader {
    async fn read(&self, call: ContractCall<'_>) -> Result<Value, DispatchError> {
        Ok(self.call_function(call).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::builtin_networks;

    #[test]
    fn test_reader_for_builtin_network() {
        let network = &builtin_networks()[0];
        let reader = RpcReader::new(network).unwrap();
        assert_eq!(reader.network().id, 5115);
    }

    #[test]
    fn test_invalid_rpc_url_rejected() {
        let network = Network {
            id: 1,
            name: "Broken".to_string(),
            rpc_url: "not a url".to_string(),
            explorer_url: None,
        };
        let err = RpcReader::new(&network).unwrap_err();
        assert!(err.to_string().contains("Invalid RPC URL"));
    }
}
