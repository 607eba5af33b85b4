use thiserror::Error;

/// The ABI text could not be turned into a usable document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAbiError {
    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("ABI must be a JSON array of entries")]
    NotAnArray,

    #[error("ABI entry #{index}: {reason}")]
    Entry { index: usize, reason: String },
}

/// An incoming session token could not be decoded.
#[derive(Debug, Error)]
pub enum InvalidSessionError {
    #[error("session token `{param}` is not valid base64: {source}")]
    Base64 {
        param: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("session token `{param}` is not valid UTF-8")]
    Utf8 { param: &'static str },

    #[error("session token `{param}` is not valid JSON: {source}")]
    Json {
        param: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("session ABI is invalid: {0}")]
    Abi(#[from] InvalidAbiError),

    #[error("session network has invalid chain ID {0}")]
    ChainId(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Network with chain ID {id} already exists ({existing})")]
pub struct DuplicateNetworkError {
    pub id: u64,
    pub existing: String,
}

/// Failure reported by a read or write collaborator. Recorded as the
/// function's outcome, never propagated past the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DispatchError(pub String);

impl DispatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        Self(err.to_string())
    }
}

/// A write was requested before the wallet side was ready.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("Please connect your wallet")]
    WalletNotConnected,

    #[error("Function '{0}' is not part of the current ABI")]
    UnknownFunction(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    #[error("Please provide a valid ABI")]
    NoAbi,

    #[error("Please select at least one function to share")]
    EmptySelection,

    #[error("Failed to encode session: {0}")]
    Encode(String),
}

/// Failure of the wallet chain negotiation capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchChainError {
    #[error("chain {0} is not known to the wallet")]
    UnknownChain(u64),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkSwitchError {
    #[error("Network with chain ID {0} is not registered")]
    NotRegistered(u64),

    #[error("Failed to switch network: {0}")]
    Wallet(String),
}
