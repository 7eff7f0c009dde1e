//! Registry of the networks a buyer is allowed to pay on.
//!
//! x402 V1 identifies networks by name (`"base-sepolia"`, `"polygon"`). The buyer
//! only accepts the names in [`KNOWN_NETWORKS`]; anything else is rejected while the
//! configuration is loaded, before a single request goes out. Every entry is an
//! EVM chain in the `eip155` CAIP-2 namespace.
//!
//! ```
//! use x402_types::networks::{chain_id_by_network_name, parse_network_name};
//!
//! let base = chain_id_by_network_name("base").unwrap();
//! assert_eq!(base.reference, "8453");
//!
//! let info = parse_network_name("  Polygon-Amoy ").unwrap();
//! assert_eq!(info.name, "polygon-amoy");
//! assert!(parse_network_name("solana").is_err());
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::chain::ChainId;

/// A known network definition with its chain ID and human-readable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Network name as it appears on the wire (e.g., "base-sepolia")
    pub name: &'static str,
    /// CAIP-2 namespace (always "eip155" here)
    pub namespace: &'static str,
    /// Chain reference (e.g., "84532" for Base Sepolia)
    pub reference: &'static str,
}

impl NetworkInfo {
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.namespace, self.reference)
    }
}

/// The allow-list of networks, in the order they are presented to users.
pub static KNOWN_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "base-sepolia",
        namespace: "eip155",
        reference: "84532",
    },
    NetworkInfo {
        name: "base",
        namespace: "eip155",
        reference: "8453",
    },
    NetworkInfo {
        name: "avalanche-fuji",
        namespace: "eip155",
        reference: "43113",
    },
    NetworkInfo {
        name: "avalanche",
        namespace: "eip155",
        reference: "43114",
    },
    NetworkInfo {
        name: "iotex",
        namespace: "eip155",
        reference: "4689",
    },
    NetworkInfo {
        name: "sei",
        namespace: "eip155",
        reference: "1329",
    },
    NetworkInfo {
        name: "sei-testnet",
        namespace: "eip155",
        reference: "1328",
    },
    NetworkInfo {
        name: "polygon",
        namespace: "eip155",
        reference: "137",
    },
    NetworkInfo {
        name: "polygon-amoy",
        namespace: "eip155",
        reference: "80002",
    },
    NetworkInfo {
        name: "peaq",
        namespace: "eip155",
        reference: "3338",
    },
];

static NAME_TO_CHAIN_ID: LazyLock<HashMap<&'static str, ChainId>> = LazyLock::new(|| {
    KNOWN_NETWORKS
        .iter()
        .map(|n| (n.name, n.chain_id()))
        .collect()
});

/// Retrieves a ChainId by its exact (case-sensitive) network name.
pub fn chain_id_by_network_name(name: &str) -> Option<&'static ChainId> {
    NAME_TO_CHAIN_ID.get(name)
}

/// Comma-separated list of supported network names, for error messages.
pub fn supported_network_names() -> String {
    KNOWN_NETWORKS
        .iter()
        .map(|n| n.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The input named a network outside [`KNOWN_NETWORKS`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported network \"{input}\". Supported networks: {supported}")]
pub struct UnsupportedNetworkError {
    pub input: String,
    pub supported: String,
}

/// Parses user input into a supported network.
///
/// Surrounding whitespace is ignored and the comparison is case-insensitive.
pub fn parse_network_name(input: &str) -> Result<&'static NetworkInfo, UnsupportedNetworkError> {
    let normalized = input.trim().to_lowercase();
    KNOWN_NETWORKS
        .iter()
        .find(|n| n.name == normalized)
        .ok_or_else(|| UnsupportedNetworkError {
            input: input.to_string(),
            supported: supported_network_names(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_from_network_name() {
        let base = chain_id_by_network_name("base").unwrap();
        assert_eq!(base.namespace, "eip155");
        assert_eq!(base.reference, "8453");

        let fuji = chain_id_by_network_name("avalanche-fuji").unwrap();
        assert_eq!(fuji.reference, "43113");

        let peaq = chain_id_by_network_name("peaq").unwrap();
        assert_eq!(peaq.reference, "3338");

        assert!(chain_id_by_network_name("Base").is_none());
        assert!(chain_id_by_network_name("celo").is_none());
    }

    #[test]
    fn test_parse_network_name_normalizes() {
        assert_eq!(parse_network_name("base-sepolia").unwrap().name, "base-sepolia");
        assert_eq!(parse_network_name(" SEI ").unwrap().name, "sei");
    }

    #[test]
    fn test_parse_network_name_rejects_unknown() {
        let err = parse_network_name("ethereum").unwrap_err();
        assert_eq!(err.input, "ethereum");
        let message = err.to_string();
        assert!(message.contains("Unsupported network \"ethereum\""));
        assert!(message.contains("base-sepolia"));
        assert!(message.contains("peaq"));
    }

    #[test]
    fn test_allow_list_is_complete() {
        assert_eq!(KNOWN_NETWORKS.len(), 10);
        assert!(KNOWN_NETWORKS.iter().all(|n| n.namespace == "eip155"));
    }
}
