//! V1 EIP-155 "exact" payment scheme, buyer side.
//!
//! The buyer authorizes an ERC-3009 `transferWithAuthorization` of exactly
//! `maxAmountRequired` from its address to `payTo`, signed as EIP-712 typed data
//! over the token's domain. The server submits the authorization on-chain.

pub mod client;
pub use client::*;

pub mod types;
pub use types::*;
