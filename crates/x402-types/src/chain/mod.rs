//! Blockchain identifiers for x402 payment processing.
//!
//! - [`ChainId`] - A CAIP-2 compliant chain identifier (e.g., `eip155:8453` for Base)

mod chain_id;

pub use chain_id::*;
