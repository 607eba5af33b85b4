//! ABI model plus the alloy-backed collaborators that actually talk to a
//! chain.

pub mod abi;
pub mod contract;
pub mod provider;
pub mod utils;
pub mod wallet;

pub use abi::{AbiDocument, AbiEntry, AbiProcessor, FunctionEntry, KeyedFunction, StateMutability};
pub use provider::RpcReader;
pub use wallet::LocalWallet;
