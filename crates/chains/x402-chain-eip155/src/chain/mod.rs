//! EVM chain access for the x402 buyer.
//!
//! # Key Types
//!
//! - [`Eip155ChainReference`] - A numeric chain ID for EVM networks (e.g., `8453` for Base)
//! - [`Eip155ReadProvider`] - Read-only JSON-RPC provider with fallback and throttling
//! - [`Erc20Reader`] - The token views a buyer needs: metadata and balances
//! - [`TokenMetadataResolver`] - Cached token metadata and balance snapshots
//!
//! The buyer never submits transactions. It signs an ERC-3009 authorization and
//! the resource server settles it, so chain access is limited to `eth_call`.

pub mod config;
pub use config::*;

pub mod erc20;
pub use erc20::{Erc20ReadError, Erc20Reader};

pub mod metadata;
pub use metadata::*;

pub mod provider;
pub use provider::*;

pub mod types;
pub use types::*;
