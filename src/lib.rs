//! ABI-driven contract interaction engine.
//!
//! Parse an ABI, split its functions into read and write groups, keep
//! per-function inputs and outcomes, dispatch calls through pluggable read
//! and write collaborators, and pack a whole session into a shareable URL.

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ethereum;
pub mod interaction;
pub mod network;
pub mod session;

pub use codec::{SessionSnapshot, SessionTokens};
pub use dispatch::{CallDispatcher, ChainNegotiator, ContractReader, ContractWriter, Dispatch};
pub use interaction::{InteractionStore, Outcome};
pub use network::{Network, NetworkRegistry};
pub use session::Session;
