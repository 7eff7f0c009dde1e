//! Configuration for a buyer run.
//!
//! Every setting is a CLI flag with an environment fallback, so a `.env` file loaded by
//! `dotenvy` is enough to drive a run. [`Config::from_args`] validates the raw arguments
//! into a [`Config`]; any error is fatal before the first request.

use clap::Parser;
use reqwest::Method;
use std::time::Duration;
use url::Url;
use x402_chain_eip155::chain::{EvmPrivateKey, RpcConfig};
use x402_types::networks::{NetworkInfo, UnsupportedNetworkError, parse_network_name};

/// CLI arguments for the x402 buyer.
#[derive(Parser, Debug, Clone)]
#[command(name = "x402-buyer")]
#[command(about = "Pay for an x402-protected resource and report what it cost")]
pub struct CliArgs {
    /// Hex private key of the paying account. A comma-separated list builds a wallet
    /// that pays from its first account.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,
    /// Base URL of the resource server, including the protocol
    #[arg(long, env = "RESOURCE_SERVER_URL")]
    pub resource_server_url: Option<String>,
    /// Path of the paid endpoint, or an absolute URL
    #[arg(long, env = "ENDPOINT_PATH", default_value = "/")]
    pub endpoint_path: String,
    /// Network to pay on
    #[arg(long, env = "NETWORK", default_value = "base-sepolia")]
    pub network: String,
    #[arg(long, env = "HTTP_METHOD", default_value = "GET")]
    pub http_method: String,
    /// Number of paid requests to make
    #[arg(long, env = "REQUEST_COUNT", default_value_t = 1, allow_negative_numbers = true)]
    pub request_count: i64,
    /// Pause between requests, in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 2000)]
    pub poll_interval_ms: u64,
    /// JSON-RPC endpoint(s) for balance and token reads, comma-separated.
    /// Defaults to the public endpoint of the network.
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,
    /// Requests per second allowed against each RPC endpoint
    #[arg(long, env = "RPC_RATE_LIMIT")]
    pub rpc_rate_limit: Option<u32>,
    /// Timeout of each HTTP request to the resource server, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 120)]
    pub http_timeout_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Cli(#[from] clap::Error),
    #[error("Missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("RESOURCE_SERVER_URL must include protocol (received: {0})")]
    MissingProtocol(String),
    #[error("Invalid URL {input:?}: {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    UnsupportedNetwork(#[from] UnsupportedNetworkError),
    #[error("Invalid HTTP_METHOD {0:?}")]
    InvalidMethod(String),
    #[error("REQUEST_COUNT must be at least 1")]
    RequestCount,
    #[error("Invalid PRIVATE_KEY: {0}")]
    InvalidPrivateKey(String),
}

/// Validated settings of a run.
#[derive(Debug, Clone)]
pub struct Config {
    pub private_keys: Vec<EvmPrivateKey>,
    pub target_url: Url,
    pub network: &'static NetworkInfo,
    pub method: Method,
    pub request_count: u32,
    pub poll_interval: Duration,
    /// Empty when the network's public endpoint should be used.
    pub rpc: Vec<RpcConfig>,
    pub http_timeout: Duration,
}

impl Config {
    /// Loads configuration from the command line and the environment.
    ///
    /// `--help` and `--version` print and exit the process.
    pub fn load() -> Result<Self, ConfigError> {
        let args = CliArgs::try_parse().map_err(|e| match e.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => e.exit(),
            _ => ConfigError::Cli(e),
        })?;
        Self::from_args(args)
    }

    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let private_key = non_blank(args.private_key.as_deref());
        let base_url = non_blank(args.resource_server_url.as_deref());
        let (private_key, base_url) = match (private_key, base_url) {
            (Some(private_key), Some(base_url)) => (private_key, base_url),
            (private_key, base_url) => {
                let mut missing = Vec::new();
                if private_key.is_none() {
                    missing.push("PRIVATE_KEY");
                }
                if base_url.is_none() {
                    missing.push("RESOURCE_SERVER_URL");
                }
                return Err(ConfigError::Missing(missing));
            }
        };

        let network = parse_network_name(&args.network)?;
        let target_url = build_url(base_url, &args.endpoint_path)?;
        let method = parse_method(&args.http_method)?;
        let request_count = u32::try_from(args.request_count)
            .ok()
            .filter(|count| *count >= 1)
            .ok_or(ConfigError::RequestCount)?;
        let private_keys = split_list(private_key)
            .map(|key| key.parse::<EvmPrivateKey>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(ConfigError::InvalidPrivateKey)?;
        let rpc = match non_blank(args.rpc_url.as_deref()) {
            Some(list) => split_list(list)
                .map(|url| {
                    Url::parse(url)
                        .map(|http| RpcConfig::new(http).with_rate_limit(args.rpc_rate_limit))
                        .map_err(|source| ConfigError::InvalidUrl {
                            input: url.to_string(),
                            source,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            private_keys,
            target_url,
            network,
            method,
            request_count,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            rpc,
            http_timeout: Duration::from_secs(args.http_timeout_secs),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn has_http_protocol(value: &str) -> bool {
    ["http://", "https://"].iter().any(|protocol| {
        value
            .get(..protocol.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(protocol))
    })
}

/// Resolves the endpoint against the resource server base URL.
///
/// An absolute `http(s)` endpoint is used as is. Otherwise the base gets a trailing
/// slash and the endpoint is joined with URL semantics, so `/path` replaces the base
/// path while `path` extends it.
pub fn build_url(base_url: &str, endpoint_path: &str) -> Result<Url, ConfigError> {
    let endpoint_path = endpoint_path.trim();
    if has_http_protocol(endpoint_path) {
        return Url::parse(endpoint_path).map_err(|source| ConfigError::InvalidUrl {
            input: endpoint_path.to_string(),
            source,
        });
    }
    let base_url = base_url.trim();
    if !has_http_protocol(base_url) {
        return Err(ConfigError::MissingProtocol(base_url.to_string()));
    }
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };
    let invalid = |source| ConfigError::InvalidUrl {
        input: base_url.to_string(),
        source,
    };
    let base = Url::parse(&normalized).map_err(invalid)?;
    let endpoint = if endpoint_path.is_empty() { "/" } else { endpoint_path };
    base.join(endpoint).map_err(invalid)
}

fn parse_method(input: &str) -> Result<Method, ConfigError> {
    let upper = input.trim().to_uppercase();
    Method::from_bytes(upper.as_bytes()).map_err(|_| ConfigError::InvalidMethod(input.to_string()))
}
