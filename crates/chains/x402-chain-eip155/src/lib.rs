//! EIP-155 (EVM) chain support for the buyer side of the x402 payment protocol.
//!
//! # Modules
//!
//! - [`chain`] - Chain references, read-only RPC providers, ERC-20 metadata and balances
//! - [`signer`] - Signing identities and the [`SignerLike`](signer::SignerLike) abstraction
//! - [`v1_eip155_exact`] - ERC-3009 authorizations for the V1 "exact" scheme
//!
//! # Example
//!
//! ```ignore
//! use x402_chain_eip155::chain::{Eip155ReadProvider, TokenMetadataResolver};
//! use x402_chain_eip155::signer::SignerIdentity;
//! use x402_chain_eip155::V1Eip155ExactClient;
//! use x402_types::networks::parse_network_name;
//!
//! let network = parse_network_name("base-sepolia")?;
//! let resolver = TokenMetadataResolver::new(Eip155ReadProvider::new(network, &[])?);
//! let resolved = SignerIdentity::Account(signer).resolve()?;
//! let client = V1Eip155ExactClient::new(resolved.signer);
//! let authorization = client.authorize(1, &requirements).await?;
//! ```

pub mod chain;
pub mod signer;
pub mod v1_eip155_exact;

mod networks;
pub use networks::*;

pub use v1_eip155_exact::V1Eip155ExactClient;
