use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{DispatchError, PreconditionError, SwitchChainError};
use crate::ethereum::abi::{AbiDocument, KeyedFunction};
use crate::interaction::{InteractionStore, Outcome};
use crate::network::Network;

/// Everything a collaborator needs to perform one contract call.
#[derive(Debug, Clone, Copy)]
pub struct ContractCall<'a> {
    pub contract_address: &'a str,
    pub abi: &'a AbiDocument,
    pub function: &'a KeyedFunction,
    pub inputs: &'a [String],
}

/// Read capability backed by a public RPC endpoint.
#[async_trait]
pub trait ContractReader: Send + Sync {
    /// Returns the decoded return value, `Value::Null` for void functions.
    async fn read(&self, call: ContractCall<'_>) -> Result<Value, DispatchError>;
}

/// Write capability backed by a wallet signer.
#[async_trait]
pub trait ContractWriter: Send + Sync {
    /// Currently connected account, if any.
    fn account(&self) -> Option<Address>;

    /// Submit a transaction and return its hash.
    async fn write(&self, call: ContractCall<'_>) -> Result<String, DispatchError>;
}

/// Wallet-side chain switching.
#[async_trait]
pub trait ChainNegotiator: Send + Sync {
    async fn switch_chain(&self, chain_id: u64) -> Result<(), SwitchChainError>;

    async fn add_chain(&self, network: &Network) -> Result<(), SwitchChainError>;
}

/// What happened to a read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Reader or contract address missing; nothing was touched.
    Skipped,
    Completed(Outcome),
}

pub type SharedStore = Arc<Mutex<InteractionStore>>;

/// Runs calls through collaborators and records outcomes. The only writer of
/// outcome and busy state in the store.
#[derive(Debug, Clone, Default)]
pub struct CallDispatcher {
    store: SharedStore,
}

impl CallDispatcher {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub async fn dispatch_read(
        &self,
        reader: Option<&dyn ContractReader>,
        contract_address: &str,
        abi: &AbiDocument,
        function: &KeyedFunction,
    ) -> Dispatch {
        let Some(reader) = reader else {
            return Dispatch::Skipped;
        };
        if contract_address.trim().is_empty() {
            return Dispatch::Skipped;
        }

        let (inputs, guard) = self.begin(function).await;
        debug!("Reading {} with {:?}", function.key, inputs);

        let call = ContractCall {
            contract_address,
            abi,
            function,
            inputs: &inputs,
        };
        let outcome = match reader.read(call).await {
            Ok(value) => {
                Outcome::Success(stringify_value(&value).unwrap_or_else(|| "Success".to_string()))
            }
            Err(e) => Outcome::Failed(e.to_string()),
        };

        self.finish(guard, outcome.clone()).await;
        Dispatch::Completed(outcome)
    }

    pub async fn dispatch_write(
        &self,
        writer: Option<&dyn ContractWriter>,
        contract_address: &str,
        abi: &AbiDocument,
        function: &KeyedFunction,
    ) -> Result<Outcome, PreconditionError> {
        let writer = match writer {
            Some(writer) if !contract_address.trim().is_empty() && writer.account().is_some() => {
                writer
            }
            _ => return Err(PreconditionError::WalletNotConnected),
        };

        let (inputs, guard) = self.begin(function).await;
        debug!("Writing {} with {:?}", function.key, inputs);

        let call = ContractCall {
            contract_address,
            abi,
            function,
            inputs: &inputs,
        };
        let outcome = match writer.write(call).await {
            Ok(hash) => {
                info!("Transaction for {} sent: {}", function.key, hash);
                Outcome::Success(format!("Transaction sent: {}", hash))
            }
            Err(e) => Outcome::Failed(e.to_string()),
        };

        self.finish(guard, outcome.clone()).await;
        Ok(outcome)
    }

    /// Mark busy and snapshot the current inputs. The returned guard clears
    /// busy again if the dispatch is dropped before `finish`.
    async fn begin(&self, function: &KeyedFunction) -> (Vec<String>, BusyGuard) {
        let mut store = self.store.lock().await;
        store.set_busy(&function.key, true);
        let inputs = store.inputs_for(&function.key, function.function.inputs.len());
        let guard = BusyGuard {
            store: Arc::clone(&self.store),
            key: Some(function.key.clone()),
        };
        (inputs, guard)
    }

    async fn finish(&self, mut guard: BusyGuard, outcome: Outcome) {
        let mut store = self.store.lock().await;
        if let Some(key) = guard.key.take() {
            store.record_outcome(&key, outcome);
            store.set_busy(&key, false);
        }
    }
}

/// Resets the busy flag of an abandoned dispatch.
struct BusyGuard {
    store: SharedStore,
    key: Option<String>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };

        debug!("Dispatch of {} dropped before completion", key);
        if let Ok(mut store) = self.store.try_lock() {
            store.set_busy(&key, false);
            return;
        }

        // Store is briefly locked elsewhere, clear the flag once it frees up
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = Arc::clone(&self.store);
                handle.spawn(async move {
                    store.lock().await.set_busy(&key, false);
                });
            }
            Err(_) => warn!("Could not clear busy flag of {}: no runtime", key),
        }
    }
}

/// Human-readable form of a decoded return value. `None` for void or empty
/// results.
pub fn stringify_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| stringify_value(item).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
