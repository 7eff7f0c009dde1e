use alloy_primitives::{Address, U256};
use alloy_provider::RootProvider;
use alloy_rpc_client::RpcClient;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use async_trait::async_trait;
use std::future::IntoFuture;
use std::num::NonZeroUsize;
use tower::ServiceBuilder;
use tracing::Instrument;

use crate::chain::config::RpcConfig;
use crate::chain::erc20::{Erc20ReadError, Erc20Reader, IERC20};
use crate::chain::types::{Eip155ChainReference, Eip155ChainReferenceFormatError};
use crate::networks::PublicRpc;
use x402_types::networks::NetworkInfo;

/// Read-only JSON-RPC access to an EVM chain.
///
/// Requests go through a fallback transport over every configured HTTP endpoint,
/// each one throttled to its own rate limit. The buyer never sends transactions:
/// the server settles the signed authorization.
#[derive(Debug, Clone)]
pub struct Eip155ReadProvider {
    inner: RootProvider,
}

#[derive(Debug, thiserror::Error)]
pub enum Eip155ProviderError {
    #[error("No HTTP RPC endpoint available for chain {0}")]
    NoTransport(Eip155ChainReference),
    #[error(transparent)]
    Chain(#[from] Eip155ChainReferenceFormatError),
}

impl Eip155ReadProvider {
    pub fn rpc_client(
        chain: Eip155ChainReference,
        rpc: &[RpcConfig],
    ) -> Result<RpcClient, Eip155ProviderError> {
        let transports = rpc
            .iter()
            .filter_map(|provider_config| {
                let scheme = provider_config.http.scheme();
                let is_http = scheme == "http" || scheme == "https";
                if !is_http {
                    return None;
                }
                let rpc_url = provider_config.http.clone();
                tracing::info!(%chain, %rpc_url, rate_limit = ?provider_config.rate_limit, "Using HTTP transport");
                let rate_limit = provider_config.rate_limit.unwrap_or(u32::MAX);
                let service = ServiceBuilder::new()
                    .layer(ThrottleLayer::new(rate_limit))
                    .service(Http::new(rpc_url));
                Some(service)
            })
            .collect::<Vec<_>>();
        let active = NonZeroUsize::new(transports.len())
            .ok_or(Eip155ProviderError::NoTransport(chain))?;
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(active))
            .service(transports);
        Ok(RpcClient::new(fallback, false))
    }

    /// Builds a provider over `rpc`, or over the network's public endpoint when `rpc` is empty.
    pub fn new(network: &NetworkInfo, rpc: &[RpcConfig]) -> Result<Self, Eip155ProviderError> {
        let chain = Eip155ChainReference::try_from(&network.chain_id())?;
        let client = if rpc.is_empty() {
            let public = PublicRpc::for_network(network.name)
                .map(RpcConfig::new)
                .ok_or(Eip155ProviderError::NoTransport(chain))?;
            Self::rpc_client(chain, &[public])?
        } else {
            Self::rpc_client(chain, rpc)?
        };
        Ok(Self {
            inner: RootProvider::new(client),
        })
    }

    pub fn inner(&self) -> &RootProvider {
        &self.inner
    }
}

#[async_trait]
impl Erc20Reader for Eip155ReadProvider {
    async fn decimals(&self, token: Address) -> Result<u8, Erc20ReadError> {
        let contract = IERC20::new(token, self.inner());
        contract
            .decimals()
            .call()
            .into_future()
            .instrument(tracing::info_span!("fetch_decimals", token = %token, otel.kind = "client"))
            .await
            .map_err(|e| Erc20ReadError::new("decimals", token, e))
    }

    async fn symbol(&self, token: Address) -> Result<String, Erc20ReadError> {
        let contract = IERC20::new(token, self.inner());
        contract
            .symbol()
            .call()
            .into_future()
            .instrument(tracing::info_span!("fetch_symbol", token = %token, otel.kind = "client"))
            .await
            .map_err(|e| Erc20ReadError::new("symbol", token, e))
    }

    async fn name(&self, token: Address) -> Result<String, Erc20ReadError> {
        let contract = IERC20::new(token, self.inner());
        contract
            .name()
            .call()
            .into_future()
            .instrument(tracing::info_span!("fetch_name", token = %token, otel.kind = "client"))
            .await
            .map_err(|e| Erc20ReadError::new("name", token, e))
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, Erc20ReadError> {
        let contract = IERC20::new(token, self.inner());
        contract
            .balanceOf(owner)
            .call()
            .into_future()
            .instrument(tracing::info_span!(
                "fetch_balance",
                token = %token,
                owner = %owner,
                otel.kind = "client"
            ))
            .await
            .map_err(|e| Erc20ReadError::new("balanceOf", token, e))
    }
}
