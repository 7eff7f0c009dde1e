use url::Url;

/// Trait providing per-network values for the EVM networks a buyer can pay on.
///
/// Implemented for [`PublicRpc`], the default JSON-RPC endpoint used when no RPC URL
/// is configured. Chain IDs live in the [`x402_types::networks`] registry.
pub trait KnownNetworkEip155<A> {
    /// Base mainnet
    fn base() -> A;
    /// Base Sepolia testnet
    fn base_sepolia() -> A;

    /// Polygon mainnet
    fn polygon() -> A;
    /// Polygon Amoy testnet
    fn polygon_amoy() -> A;

    /// Avalanche C-Chain mainnet
    fn avalanche() -> A;
    /// Avalanche Fuji testnet
    fn avalanche_fuji() -> A;

    /// Sei mainnet
    fn sei() -> A;
    /// Sei testnet
    fn sei_testnet() -> A;

    /// IoTeX mainnet
    fn iotex() -> A;

    /// Peaq mainnet
    fn peaq() -> A;
}

/// Marker for the public JSON-RPC endpoint of a network.
pub struct PublicRpc;

impl KnownNetworkEip155<&'static str> for PublicRpc {
    fn base() -> &'static str {
        "https://mainnet.base.org"
    }

    fn base_sepolia() -> &'static str {
        "https://sepolia.base.org"
    }

    fn polygon() -> &'static str {
        "https://polygon-rpc.com"
    }

    fn polygon_amoy() -> &'static str {
        "https://rpc-amoy.polygon.technology"
    }

    fn avalanche() -> &'static str {
        "https://api.avax.network/ext/bc/C/rpc"
    }

    fn avalanche_fuji() -> &'static str {
        "https://api.avax-test.network/ext/bc/C/rpc"
    }

    fn sei() -> &'static str {
        "https://evm-rpc.sei-apis.com"
    }

    fn sei_testnet() -> &'static str {
        "https://evm-rpc-testnet.sei-apis.com"
    }

    fn iotex() -> &'static str {
        "https://babel-api.mainnet.iotex.io"
    }

    fn peaq() -> &'static str {
        "https://peaq.api.onfinality.io/public"
    }
}

impl PublicRpc {
    /// Default RPC endpoint for a network by its wire name, `None` for any other name.
    pub fn for_network(name: &str) -> Option<Url> {
        let url = match name {
            "base" => Self::base(),
            "base-sepolia" => Self::base_sepolia(),
            "polygon" => Self::polygon(),
            "polygon-amoy" => Self::polygon_amoy(),
            "avalanche" => Self::avalanche(),
            "avalanche-fuji" => Self::avalanche_fuji(),
            "sei" => Self::sei(),
            "sei-testnet" => Self::sei_testnet(),
            "iotex" => Self::iotex(),
            "peaq" => Self::peaq(),
            _ => return None,
        };
        Url::parse(url).ok()
    }
}
