use alloy_primitives::B256;
use alloy_signer_local::PrivateKeySigner;
use std::str::FromStr;
use url::Url;

/// A validated EVM private key (32 bytes), hex encoded with or without `0x`.
#[derive(Clone, Copy)]
pub struct EvmPrivateKey(B256);

impl EvmPrivateKey {
    pub fn to_signer(&self) -> Result<PrivateKeySigner, alloy_signer_local::LocalSignerError> {
        PrivateKeySigner::from_bytes(&self.0).map_err(Into::into)
    }
}

// Never print key material.
impl std::fmt::Debug for EvmPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EvmPrivateKey(..)")
    }
}

impl PartialEq for EvmPrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl FromStr for EvmPrivateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid evm private key: {}", e))
    }
}

/// One JSON-RPC endpoint of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub http: Url,
    /// Requests per second; unlimited when `None`.
    pub rate_limit: Option<u32>,
}

impl RpcConfig {
    pub fn new(http: Url) -> Self {
        Self {
            http,
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: Option<u32>) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}
