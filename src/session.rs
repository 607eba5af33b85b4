use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::codec::{self, SessionSnapshot, SessionTokens};
use crate::dispatch::{CallDispatcher, ChainNegotiator, ContractReader, ContractWriter, Dispatch};
use crate::error::{
    DuplicateNetworkError, InvalidAbiError, NetworkSwitchError, PreconditionError, ShareError,
    SwitchChainError,
};
use crate::ethereum::abi::{AbiProcessor, FunctionEntry};
use crate::interaction::{FunctionState, Outcome};
use crate::network::{Network, NetworkRegistry};

/// Application state for one interaction session: selected network,
/// contract address, ABI text and its classification, per-function state and
/// the pending share selection.
#[derive(Debug)]
pub struct Session {
    registry: NetworkRegistry,
    selected: u64,
    contract_address: String,
    abi_text: String,
    abi: AbiProcessor,
    dispatcher: CallDispatcher,
    share_selection: Option<BTreeSet<String>>,
}

impl Session {
    pub fn new(registry: NetworkRegistry) -> Self {
        let selected = registry.default_network().id;
        Self {
            registry,
            selected,
            contract_address: String::new(),
            abi_text: String::new(),
            abi: AbiProcessor::new(),
            dispatcher: CallDispatcher::default(),
            share_selection: None,
        }
    }

    /// Start from a shared link. A link that fails to decode is logged and
    /// the session starts from defaults.
    pub fn from_url(registry: NetworkRegistry, url: &Url) -> Self {
        Self::from_tokens(registry, &SessionTokens::from_url(url))
    }

    pub fn from_tokens(mut registry: NetworkRegistry, tokens: &SessionTokens) -> Self {
        if tokens.is_empty() {
            return Self::new(registry);
        }

        match codec::decode(tokens, &mut registry) {
            Ok(snapshot) => {
                let mut session = Self::new(registry);
                session.apply_snapshot(snapshot);
                session
            }
            Err(e) => {
                warn!("Failed to load session from link, using defaults: {}", e);
                Self::new(registry)
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: SessionSnapshot) {
        self.selected = snapshot.network.id;
        self.contract_address = snapshot.contract_address;

        if snapshot.abi_subset.is_empty() {
            return;
        }
        let text = codec::reduced_abi_json(&snapshot.abi_subset)
            .and_then(|json| serde_json::to_string_pretty(&json));
        match text {
            Ok(text) => {
                // Text produced from validated entries always parses
                let _ = self.set_abi_text(text);
            }
            Err(e) => warn!("Failed to restore ABI from link: {}", e),
        }
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    pub fn selected_network(&self) -> &Network {
        self.registry
            .lookup(self.selected)
            .unwrap_or_else(|| self.registry.default_network())
    }

    /// Select a registered network. Returns false for unknown ids.
    pub fn select_network(&mut self, id: u64) -> bool {
        if !self.registry.contains(id) {
            return false;
        }
        self.selected = id;
        true
    }

    /// Register a custom network without selecting it.
    pub fn add_network(&mut self, network: Network) -> Result<(), DuplicateNetworkError> {
        self.registry.register(network)
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    pub fn set_contract_address(&mut self, address: impl Into<String>) {
        self.contract_address = address.into();
    }

    pub fn abi_text(&self) -> &str {
        &self.abi_text
    }

    /// Replace the ABI text and reclassify. State of functions that are no
    /// longer present is dropped.
    pub fn set_abi_text(&mut self, text: impl Into<String>) -> Result<(), InvalidAbiError> {
        self.abi_text = text.into();
        self.share_selection = None;
        let result = self.abi.process(&self.abi_text);

        self.prune_store();
        result
    }

    fn prune_store(&self) {
        let keys: Vec<String> = self
            .abi
            .classification()
            .keys()
            .map(str::to_string)
            .collect();

        let store = self.dispatcher.store();
        if let Ok(mut store) = store.try_lock() {
            store.retain_keys(keys.iter().map(String::as_str));
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Function state is locked, pruning once it is released");
                let store = Arc::clone(store);
                handle.spawn(async move {
                    store.lock().await.retain_keys(keys.iter().map(String::as_str));
                });
            }
            Err(_) => warn!("Function state is locked, stale entries were not pruned"),
        }
    }

    pub fn abi(&self) -> &AbiProcessor {
        &self.abi
    }

    pub async fn set_input(&self, key: &str, index: usize, value: impl Into<String>) {
        self.dispatcher
            .store()
            .lock()
            .await
            .set_input(key, index, value);
    }

    pub async fn function_state(&self, key: &str) -> Option<FunctionState> {
        self.dispatcher.store().lock().await.get(key).cloned()
    }

    pub async fn dispatch_read(&self, key: &str, reader: Option<&dyn ContractReader>) -> Dispatch {
        let (Some(document), Some(function)) = (self.abi.document(), self.abi.find(key)) else {
            debug!("Ignoring read of unknown function {}", key);
            return Dispatch::Skipped;
        };

        self.dispatcher
            .dispatch_read(reader, &self.contract_address, document, function)
            .await
    }

    pub async fn dispatch_write(
        &self,
        key: &str,
        writer: Option<&dyn ContractWriter>,
    ) -> Result<Outcome, PreconditionError> {
        let (Some(document), Some(function)) = (self.abi.document(), self.abi.find(key)) else {
            return Err(PreconditionError::UnknownFunction(key.to_string()));
        };

        self.dispatcher
            .dispatch_write(writer, &self.contract_address, document, function)
            .await
    }

    /// Open the share flow with every classified function selected.
    pub fn begin_share(&mut self) -> &BTreeSet<String> {
        let all = self.abi.classification().keys().map(str::to_string).collect();
        self.share_selection.insert(all)
    }

    pub fn set_shared(&mut self, key: &str, shared: bool) {
        let selection = self.share_selection.get_or_insert_with(BTreeSet::new);
        if shared {
            selection.insert(key.to_string());
        } else {
            selection.remove(key);
        }
    }

    pub fn share_selection(&self) -> Option<&BTreeSet<String>> {
        self.share_selection.as_ref()
    }

    /// Build the share URL for the current selection on top of `base`.
    pub fn confirm_share(&mut self, base: &Url) -> Result<Url, ShareError> {
        if self.abi.document().is_none() {
            return Err(ShareError::NoAbi);
        }
        if self.share_selection.is_none() {
            self.begin_share();
        }

        let selection = self.share_selection.as_ref().ok_or(ShareError::EmptySelection)?;
        let abi_subset: Vec<FunctionEntry> = self
            .abi
            .classification()
            .read
            .iter()
            .chain(&self.abi.classification().write)
            .filter(|f| selection.contains(&f.key))
            .map(|f| f.function.clone())
            .collect();
        if abi_subset.is_empty() {
            return Err(ShareError::EmptySelection);
        }

        let snapshot = SessionSnapshot {
            network: self.selected_network().clone(),
            contract_address: self.contract_address.clone(),
            abi_subset,
        };
        let tokens = codec::encode(&snapshot).map_err(|e| ShareError::Encode(e.to_string()))?;

        self.share_selection = None;
        info!(
            "Created share link with {} functions",
            snapshot.abi_subset.len()
        );
        Ok(tokens.to_url(base))
    }

    /// Ask the wallet to move to `chain_id`. A chain the wallet does not know
    /// is added and the switch retried once.
    pub async fn switch_network(
        &mut self,
        chain_id: u64,
        negotiator: &dyn ChainNegotiator,
    ) -> Result<(), NetworkSwitchError> {
        let network = self
            .registry
            .lookup(chain_id)
            .cloned()
            .ok_or(NetworkSwitchError::NotRegistered(chain_id))?;

        match negotiator.switch_chain(chain_id).await {
            Ok(()) => {}
            Err(SwitchChainError::UnknownChain(_)) => {
                debug!("Wallet does not know chain {}, adding it", chain_id);
                negotiator
                    .add_chain(&network)
                    .await
                    .map_err(|e| NetworkSwitchError::Wallet(e.to_string()))?;
                negotiator
                    .switch_chain(chain_id)
                    .await
                    .map_err(|e| NetworkSwitchError::Wallet(e.to_string()))?;
            }
            Err(e) => return Err(NetworkSwitchError::Wallet(e.to_string())),
        }

        info!("Switched to {} ({})", network.name, network.id);
        self.selected = chain_id;
        Ok(())
    }
}
