//! CAIP-2 chain identifiers.
//!
//! A CAIP-2 chain ID is `namespace:reference`, e.g. `eip155:84532` for Base Sepolia.
//! The x402 V1 wire format names networks (`"base-sepolia"`) instead; the
//! [`networks`](crate::networks) registry maps names to chain IDs.
//!
//! ```
//! use x402_types::chain::ChainId;
//!
//! let base: ChainId = "eip155:8453".parse().unwrap();
//! assert_eq!(base.namespace, "eip155");
//! assert_eq!(ChainId::from_network_name("base"), Some(base));
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;

use crate::networks;

/// A CAIP-2 compliant blockchain identifier.
///
/// Serializes to/from a colon-separated string: `"eip155:8453"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    /// The blockchain namespace (`eip155` for EVM chains).
    pub namespace: String,
    /// The chain-specific reference (`8453` for Base).
    pub reference: String,
}

impl ChainId {
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    /// Looks up the chain ID of a supported network name, e.g. `"base-sepolia"`.
    ///
    /// Returns `None` for names outside the [`networks::KNOWN_NETWORKS`] registry.
    pub fn from_network_name(network_name: &str) -> Option<Self> {
        networks::chain_id_by_network_name(network_name).cloned()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

/// Error returned when parsing an invalid chain ID string.
#[derive(Debug, thiserror::Error)]
#[error("Invalid chain id format {0}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((namespace, reference)) if !namespace.is_empty() && !reference.is_empty() => {
                Ok(ChainId::new(namespace, reference))
            }
            _ => Err(ChainIdFormatError(s.into())),
        }
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChainId::from_str(&s).map_err(de::Error::custom)
    }
}
