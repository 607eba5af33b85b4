//! Session <-> URL query tokens.
//!
//! The `abi` token is base64 over a JSON array of reduced function
//! descriptors; `networkData` is base64 over the JSON network record and is
//! only emitted for networks that are not built in.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::error::InvalidSessionError;
use crate::ethereum::abi::{AbiDocument, FunctionEntry, Param, StateMutability};
use crate::network::{self, Network, NetworkRegistry};

pub const PARAM_NETWORK: &str = "network";
pub const PARAM_ADDRESS: &str = "address";
pub const PARAM_ABI: &str = "abi";
pub const PARAM_NETWORK_DATA: &str = "networkData";

/// Everything needed to rebuild an interaction session elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub network: Network,
    pub contract_address: String,
    pub abi_subset: Vec<FunctionEntry>,
}

/// Raw query values as they travel in a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    pub network: Option<String>,
    pub address: Option<String>,
    pub abi: Option<String>,
    pub network_data: Option<String>,
}

impl SessionTokens {
    pub fn from_url(url: &Url) -> Self {
        let mut tokens = Self::default();
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                PARAM_NETWORK => &mut tokens.network,
                PARAM_ADDRESS => &mut tokens.address,
                PARAM_ABI => &mut tokens.abi,
                PARAM_NETWORK_DATA => &mut tokens.network_data,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        tokens
    }

    pub fn is_empty(&self) -> bool {
        self.network.is_none()
            && self.address.is_none()
            && self.abi.is_none()
            && self.network_data.is_none()
    }

    /// Absolute URL made of `base`'s origin and path plus these tokens.
    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut query = url.query_pairs_mut();
            let pairs = [
                (PARAM_NETWORK, &self.network),
                (PARAM_ADDRESS, &self.address),
                (PARAM_ABI, &self.abi),
                (PARAM_NETWORK_DATA, &self.network_data),
            ];
            for (key, value) in pairs {
                if let Some(value) = value {
                    query.append_pair(key, value);
                }
            }
        }
        url
    }
}

/// A function reduced to the fields that travel in a share URL.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReducedFunction<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    inputs: &'a [Param],
    outputs: &'a [Param],
    state_mutability: StateMutability,
}

impl<'a> From<&'a FunctionEntry> for ReducedFunction<'a> {
    fn from(function: &'a FunctionEntry) -> Self {
        Self {
            kind: "function",
            name: &function.name,
            inputs: &function.inputs,
            outputs: &function.outputs,
            state_mutability: function.state_mutability,
        }
    }
}

/// JSON array of reduced function descriptors, before base64.
pub fn reduced_abi_json(functions: &[FunctionEntry]) -> serde_json::Result<Value> {
    let reduced: Vec<ReducedFunction<'_>> = functions.iter().map(ReducedFunction::from).collect();
    serde_json::to_value(reduced)
}

pub fn encode(snapshot: &SessionSnapshot) -> serde_json::Result<SessionTokens> {
    let abi = serde_json::to_string(&reduced_abi_json(&snapshot.abi_subset)?)?;

    let network_data = if network::is_builtin(snapshot.network.id) {
        None
    } else {
        Some(STANDARD.encode(serde_json::to_string(&snapshot.network)?))
    };

    Ok(SessionTokens {
        network: Some(snapshot.network.id.to_string()),
        address: Some(snapshot.contract_address.clone()),
        abi: Some(STANDARD.encode(abi)),
        network_data,
    })
}

fn decode_text(param: &'static str, token: &str) -> Result<String, InvalidSessionError> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|source| InvalidSessionError::Base64 { param, source })?;
    String::from_utf8(bytes).map_err(|_| InvalidSessionError::Utf8 { param })
}

/// Decode tokens into a snapshot, registering an embedded custom network
/// when its id is not known yet. The returned snapshot carries the network
/// the caller should select.
pub fn decode(
    tokens: &SessionTokens,
    registry: &mut NetworkRegistry,
) -> Result<SessionSnapshot, InvalidSessionError> {
    let abi_subset = match &tokens.abi {
        Some(token) => {
            let text = decode_text(PARAM_ABI, token)?;
            let value: Value = serde_json::from_str(&text).map_err(|source| {
                InvalidSessionError::Json {
                    param: PARAM_ABI,
                    source,
                }
            })?;
            AbiDocument::from_value(value)?
                .functions()
                .cloned()
                .collect()
        }
        None => Vec::new(),
    };

    let embedded = match &tokens.network_data {
        Some(token) => {
            let text = decode_text(PARAM_NETWORK_DATA, token)?;
            let network: Network = serde_json::from_str(&text).map_err(|source| {
                InvalidSessionError::Json {
                    param: PARAM_NETWORK_DATA,
                    source,
                }
            })?;
            if network.id == 0 {
                return Err(InvalidSessionError::ChainId(network.id));
            }
            Some(network)
        }
        None => None,
    };

    let network = match embedded {
        Some(network) if !registry.contains(network.id) => {
            info!("Adding network {} from session link", network.name);
            // Not registered yet, so this cannot collide
            let _ = registry.register(network.clone());
            network
        }
        _ => tokens
            .network
            .as_deref()
            .and_then(|id| id.trim().parse::<u64>().ok())
            .and_then(|id| registry.lookup(id))
            .unwrap_or_else(|| {
                debug!("Session network missing or unknown, using default");
                registry.default_network()
            })
            .clone(),
    };

    Ok(SessionSnapshot {
        network,
        contract_address: tokens.address.clone().unwrap_or_default(),
        abi_subset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED_ABI: &str = r#"[
        {"type":"constructor","inputs":[],"stateMutability":"nonpayable"},
        {"type":"function","name":"balanceOf","inputs":[{"name":"owner","type":"address","internalType":"address"}],"outputs":[{"name":"","type":"uint256","internalType":"uint256"}],"stateMutability":"view"},
        {"type":"event","name":"Transfer","inputs":[],"anonymous":false},
        {"type":"function","name":"submit","inputs":[{"name":"order","type":"tuple","components":[{"name":"maker","type":"address"},{"name":"amount","type":"uint256"}]}],"outputs":[],"stateMutability":"payable"}
    ]"#;

    fn functions() -> Vec<FunctionEntry> {
        AbiDocument::parse(MIXED_ABI)
            .unwrap()
            .unwrap()
            .functions()
            .cloned()
            .collect()
    }

    fn anvil() -> Network {
        Network {
            id: 31337,
            name: "Anvil".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            explorer_url: None,
        }
    }

    #[test]
    fn test_reduced_function_shape() {
        let json = reduced_abi_json(&functions()[..1]).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "type": "function",
                "name": "balanceOf",
                "inputs": [{"name": "owner", "type": "address", "internalType": "address"}],
                "outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}],
                "stateMutability": "view"
            }])
        );
    }

    #[test]
    fn test_round_trip_builtin_network() {
        let mut registry = NetworkRegistry::new();
        let snapshot = SessionSnapshot {
            network: registry.lookup(62298).unwrap().clone(),
            contract_address: "0x3100000000000000000000000000000000000002".to_string(),
            abi_subset: functions(),
        };

        let tokens = encode(&snapshot).unwrap();
        assert_eq!(tokens.network.as_deref(), Some("62298"));
        assert!(tokens.network_data.is_none());

        let decoded = decode(&tokens, &mut registry).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.abi_subset.len(), 2);
    }

    #[test]
    fn test_non_function_entries_are_dropped() {
        let mut registry = NetworkRegistry::new();
        let abi_json = serde_json::to_string(
            &serde_json::from_str::<Value>(MIXED_ABI).unwrap(),
        )
        .unwrap();
        let tokens = SessionTokens {
            abi: Some(STANDARD.encode(abi_json)),
            ..Default::default()
        };

        let decoded = decode(&tokens, &mut registry).unwrap();
        let names: Vec<&str> = decoded.abi_subset.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["balanceOf", "submit"]);
    }

    #[test]
    fn test_custom_network_is_embedded_and_registered() {
        let mut sender = NetworkRegistry::new();
        sender.register(anvil()).unwrap();
        let snapshot = SessionSnapshot {
            network: anvil(),
            contract_address: "0xdead".to_string(),
            abi_subset: functions(),
        };

        let tokens = encode(&snapshot).unwrap();
        assert!(tokens.network_data.is_some());

        let mut receiver = NetworkRegistry::new();
        let decoded = decode(&tokens, &mut receiver).unwrap();
        assert_eq!(decoded.network, anvil());
        assert_eq!(receiver.lookup(31337), Some(&anvil()));

        // Second decode finds it already registered
        let again = decode(&tokens, &mut receiver).unwrap();
        assert_eq!(again.network.id, 31337);
        assert_eq!(receiver.networks().len(), 3);
    }

    #[test]
    fn test_unknown_network_falls_back_to_default() {
        let mut registry = NetworkRegistry::new();
        let tokens = SessionTokens {
            network: Some("999".to_string()),
            address: Some("0xabc".to_string()),
            ..Default::default()
        };
        let decoded = decode(&tokens, &mut registry).unwrap();
        assert_eq!(decoded.network.id, registry.default_network().id);
        assert_eq!(decoded.contract_address, "0xabc");
        assert!(decoded.abi_subset.is_empty());

        let garbage = SessionTokens {
            network: Some("not-a-number".to_string()),
            ..Default::default()
        };
        let decoded = decode(&garbage, &mut registry).unwrap();
        assert_eq!(decoded.network.id, 5115);
    }

    #[test]
    fn test_invalid_tokens_are_rejected() {
        let mut registry = NetworkRegistry::new();

        let bad_base64 = SessionTokens {
            abi: Some("%%%not base64%%%".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            decode(&bad_base64, &mut registry),
            Err(InvalidSessionError::Base64 { param: "abi", .. })
        ));

        let bad_json = SessionTokens {
            abi: Some(STANDARD.encode("[{oops")),
            ..Default::default()
        };
        assert!(matches!(
            decode(&bad_json, &mut registry),
            Err(InvalidSessionError::Json { param: "abi", .. })
        ));

        let bad_network = SessionTokens {
            network_data: Some(STANDARD.encode(r#"{"id":"x"}"#)),
            ..Default::default()
        };
        assert!(matches!(
            decode(&bad_network, &mut registry),
            Err(InvalidSessionError::Json {
                param: "networkData",
                ..
            })
        ));
        assert_eq!(registry.networks().len(), 2);
    }

    #[test]
    fn test_zero_chain_id_is_rejected() {
        let mut registry = NetworkRegistry::new();
        let mut zero = anvil();
        zero.id = 0;

        let tokens = SessionTokens {
            network: Some("0".to_string()),
            network_data: Some(STANDARD.encode(serde_json::to_string(&zero).unwrap())),
            ..Default::default()
        };
        assert!(matches!(
            decode(&tokens, &mut registry),
            Err(InvalidSessionError::ChainId(0))
        ));
        assert!(!registry.contains(0));
    }

    #[test]
    fn test_tokens_url_round_trip() {
        let mut registry = NetworkRegistry::new();
        registry.register(anvil()).unwrap();
        let snapshot = SessionSnapshot {
            network: anvil(),
            contract_address: "0x3100000000000000000000000000000000000002".to_string(),
            abi_subset: functions(),
        };
        let tokens = encode(&snapshot).unwrap();

        let base = Url::parse("https://tools.example/evm/?stale=1#frag").unwrap();
        let url = tokens.to_url(&base);
        assert_eq!(url.path(), "/evm/");
        assert!(url.fragment().is_none());
        assert!(url.query().unwrap().starts_with("network=31337&address=0x31"));

        assert_eq!(SessionTokens::from_url(&url), tokens);
    }
}
