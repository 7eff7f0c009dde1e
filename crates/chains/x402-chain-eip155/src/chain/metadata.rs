//! Token metadata and balances for the asset being paid.
//!
//! The payment token is described by `decimals`, `symbol` and `name`. For an
//! ERC-20 contract these come from the chain, once per address per resolver; for
//! a symbolic asset they are inferred from the hints in the requirements `extra`.

use alloy_primitives::{Address, U256};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use x402_types::proto::v1::PaymentRequirements;
use x402_types::util::format_units;
use x402_types::util::token_amount::decimal_u256;

use crate::chain::erc20::Erc20Reader;

/// Decimals assumed when neither the chain nor the requirements say otherwise.
pub const DEFAULT_DECIMALS: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub decimals: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A token balance read at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    #[serde(with = "decimal_u256")]
    pub raw: U256,
    pub formatted: String,
    pub decimals: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl BalanceSnapshot {
    pub fn new(raw: U256, decimals: u8, symbol: Option<String>) -> Self {
        Self {
            raw,
            formatted: format_units(raw, decimals),
            decimals,
            symbol,
        }
    }
}

/// How the asset of a payment requirement is displayed and measured.
#[derive(Debug, Clone)]
pub struct ResolvedAsset {
    /// Contract address, when the asset is an ERC-20 token.
    pub address: Option<Address>,
    pub decimals: u8,
    pub symbol: Option<String>,
    /// On-chain metadata, shared with the resolver cache.
    pub metadata: Option<Arc<TokenMetadata>>,
}

/// Parses `asset` as a `0x`-prefixed 20-byte hex address.
pub fn parse_asset_address(asset: &str) -> Option<Address> {
    if !asset.starts_with("0x") && !asset.starts_with("0X") {
        return None;
    }
    asset.parse::<Address>().ok()
}

/// Token decimals hinted by the requirements, or `fallback`.
pub fn infer_decimals(requirements: &PaymentRequirements, fallback: u8) -> u8 {
    if let Some(decimals) = requirements.extra().and_then(|extra| extra.decimals()) {
        return decimals;
    }
    if requirements.asset.to_lowercase().contains("usdc") {
        return 6;
    }
    fallback
}

/// Token symbol hinted by the requirements.
pub fn infer_symbol(requirements: &PaymentRequirements) -> Option<String> {
    requirements
        .extra()
        .and_then(|extra| extra.symbol())
        .map(str::to_string)
}

/// Resolves and caches token metadata for the lifetime of a run.
///
/// The cache is keyed by the lowercase address and never invalidated. Two
/// concurrent misses for the same token both read the chain; the last write wins.
pub struct TokenMetadataResolver<R> {
    reader: R,
    cache: DashMap<String, Arc<TokenMetadata>>,
}

impl<R> TokenMetadataResolver<R>
where
    R: Erc20Reader + Send + Sync,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            cache: DashMap::new(),
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    fn cache_key(token: Address) -> String {
        format!("{token:#x}")
    }

    pub fn cached(&self, token: Address) -> Option<Arc<TokenMetadata>> {
        self.cache
            .get(&Self::cache_key(token))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Reads `decimals`, `symbol` and `name` of an ERC-20 token, once.
    ///
    /// Each read may fail on its own. Unreadable decimals fall back to [`DEFAULT_DECIMALS`].
    #[tracing::instrument(skip_all, fields(token = %token))]
    pub async fn resolve(&self, token: Address) -> Arc<TokenMetadata> {
        if let Some(hit) = self.cached(token) {
            return hit;
        }
        let (decimals, symbol, name) = tokio::join!(
            self.reader.decimals(token),
            self.reader.symbol(token),
            self.reader.name(token),
        );
        let decimals = decimals.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Token decimals unavailable, assuming {DEFAULT_DECIMALS}");
            DEFAULT_DECIMALS
        });
        let metadata = Arc::new(TokenMetadata {
            decimals,
            symbol: symbol.ok(),
            name: name.ok(),
        });
        self.cache
            .insert(Self::cache_key(token), Arc::clone(&metadata));
        metadata
    }

    /// Decimals and symbol of the asset named by `requirements`.
    ///
    /// ERC-20 assets are resolved on-chain, with the symbol hint as a fallback.
    /// Symbolic assets never touch the chain.
    pub async fn resolve_asset(&self, requirements: &PaymentRequirements) -> ResolvedAsset {
        let inferred_symbol = infer_symbol(requirements);
        match parse_asset_address(&requirements.asset) {
            Some(address) => {
                let metadata = self.resolve(address).await;
                ResolvedAsset {
                    address: Some(address),
                    decimals: metadata.decimals,
                    symbol: metadata.symbol.clone().or(inferred_symbol),
                    metadata: Some(metadata),
                }
            }
            None => ResolvedAsset {
                address: None,
                decimals: infer_decimals(requirements, DEFAULT_DECIMALS),
                symbol: inferred_symbol,
                metadata: None,
            },
        }
    }

    /// Current token balance of `owner`, or `None` when it cannot be read.
    pub async fn balance(
        &self,
        token: Address,
        owner: Address,
        decimals: u8,
        symbol: Option<String>,
    ) -> Option<BalanceSnapshot> {
        match self.reader.balance_of(token, owner).await {
            Ok(raw) => Some(BalanceSnapshot::new(raw, decimals, symbol)),
            Err(e) => {
                tracing::warn!(error = %e, "Unable to fetch token balance for {token}");
                None
            }
        }
    }
}
