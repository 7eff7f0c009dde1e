//! Driving a run: N iterations of probe, select, authorize and settle.
//!
//! A [`Buyer`] is built once (INIT), then [`Buyer::run`] performs the configured number of
//! iterations in sequence and returns a [`RunReport`]. Transport and signing failures are
//! recorded on the iteration and the run moves on. A challenge the buyer cannot act on
//! (malformed body, no acceptable terms) ends the run.

use alloy_primitives::{Address, I256, U256};
use reqwest::header::{HeaderValue, InvalidHeaderValue};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt::Display;
use std::time::{Duration, Instant};
use x402_chain_eip155::V1Eip155ExactClient;
use x402_chain_eip155::chain::{
    BalanceSnapshot, Eip155ProviderError, Eip155ReadProvider, Erc20Reader, TokenMetadataResolver,
};
use x402_chain_eip155::signer::{DynSigner, SignerError, SignerIdentity};
use x402_chain_eip155::v1_eip155_exact::AuthorizeError;
use x402_types::proto::v1::{PaymentRequirements, SettleResponse};
use x402_types::util::format_units;

use crate::config::{Config, ConfigError};
use crate::probe::{Exchange, ProbeOutcome, ResourceClient};
use crate::reconcile::reconcile;
use crate::report;
use crate::select::{Challenge, ChallengeError, SelectionError};

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error(transparent)]
    Provider(#[from] Eip155ProviderError),
    #[error("Unable to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Errors recorded on a single iteration.
#[derive(Debug, thiserror::Error)]
pub enum IterationError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Authorize(#[from] AuthorizeError),
    #[error("Payment header is not a valid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

enum IterationFailure {
    Fatal(RunError),
    Recovered(IterationError),
}

impl From<IterationError> for IterationFailure {
    fn from(error: IterationError) -> Self {
        IterationFailure::Recovered(error)
    }
}

impl From<reqwest::Error> for IterationFailure {
    fn from(error: reqwest::Error) -> Self {
        IterationFailure::Recovered(error.into())
    }
}

impl From<AuthorizeError> for IterationFailure {
    fn from(error: AuthorizeError) -> Self {
        IterationFailure::Recovered(error.into())
    }
}

impl From<InvalidHeaderValue> for IterationFailure {
    fn from(error: InvalidHeaderValue) -> Self {
        IterationFailure::Recovered(error.into())
    }
}

fn fatal<E: Into<RunError>>(error: E) -> IterationFailure {
    IterationFailure::Fatal(error.into())
}

fn serialize_display<T: Display, S: Serializer>(
    value: &Option<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.collect_str(value),
        None => serializer.serialize_none(),
    }
}

/// Everything observed in one iteration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationResult {
    pub iteration: u32,
    pub total: u32,
    pub target_url: String,
    /// HTTP status of the final response, `0` when none was received.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<PaymentRequirements>,
    #[serde(
        serialize_with = "serialize_display",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount_atomic: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_decimals: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_before: Option<BalanceSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<BalanceSnapshot>,
    /// `before - after` in atomic units; positive when funds were spent.
    #[serde(
        serialize_with = "serialize_display",
        skip_serializing_if = "Option::is_none"
    )]
    pub balance_diff: Option<I256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_response_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded_payment: Option<SettleResponse>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IterationResult {
    fn new(iteration: u32, total: u32, target_url: String) -> Self {
        Self {
            iteration,
            total,
            target_url,
            status: 0,
            response_body: None,
            response_text: None,
            requirement: None,
            amount_atomic: None,
            amount_formatted: None,
            amount_decimals: None,
            asset: None,
            asset_symbol: None,
            network: None,
            balance_before: None,
            balance_after: None,
            balance_diff: None,
            payment_response_header: None,
            decoded_payment: None,
            duration_ms: 0,
            error: None,
        }
    }

    fn record_exchange(&mut self, exchange: Exchange) {
        self.status = exchange.status.as_u16();
        self.response_body = exchange.body.parsed;
        self.response_text = Some(exchange.body.text);
        self.payment_response_header = exchange.payment_response;
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

/// Total spent on one asset of one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendEntry {
    /// `lowercase(asset)@network`
    pub key: String,
    #[serde(serialize_with = "x402_types::util::token_amount::decimal_u256::serialize")]
    pub raw: U256,
    /// Decimals of the last iteration that paid in this asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl SpendEntry {
    /// `"1.5 USDC"`, with `units` standing in for an unknown symbol.
    pub fn display(&self) -> String {
        let amount = match self.decimals {
            Some(decimals) => format_units(self.raw, decimals),
            None => self.raw.to_string(),
        };
        format!("{amount} {}", self.symbol.as_deref().unwrap_or("units"))
    }
}

/// Spend per asset and network over successful iterations, in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SpendAggregate(Vec<SpendEntry>);

impl SpendAggregate {
    pub fn spend_key(asset: &str, network: &str) -> String {
        format!("{}@{network}", asset.to_lowercase())
    }

    /// Adds the amount of a successful iteration. Anything else is ignored.
    pub fn record(&mut self, result: &IterationResult) {
        if !result.is_success() {
            return;
        }
        let (Some(amount), Some(asset), Some(network)) =
            (result.amount_atomic, &result.asset, &result.network)
        else {
            return;
        };
        let key = Self::spend_key(asset, network);
        match self.0.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => {
                entry.raw = entry.raw.saturating_add(amount);
                entry.decimals = result.amount_decimals.or(entry.decimals);
                entry.symbol = result.asset_symbol.clone().or(entry.symbol.take());
            }
            None => self.0.push(SpendEntry {
                key,
                raw: amount,
                decimals: result.amount_decimals,
                symbol: result.asset_symbol.clone(),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&SpendEntry> {
        self.0.iter().find(|entry| entry.key == key)
    }

    pub fn entries(&self) -> &[SpendEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub results: Vec<IterationResult>,
    pub totals: SpendAggregate,
}

/// Per-run settings that do not depend on the chain or the signer.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Wire name of the network to pay on, e.g. `base-sepolia`.
    pub network: String,
    pub request_count: u32,
    pub poll_interval: Duration,
}

/// Pays for a resource, repeatedly.
pub struct Buyer<R> {
    settings: RunSettings,
    http: ResourceClient,
    resolver: TokenMetadataResolver<R>,
    client: V1Eip155ExactClient<DynSigner>,
    wallet: Address,
}

impl Buyer<Eip155ReadProvider> {
    /// Builds a buyer reading the chain over JSON-RPC.
    pub fn from_config(config: &Config) -> Result<Self, RunError> {
        let provider = Eip155ReadProvider::new(config.network, &config.rpc)?;
        let identity = SignerIdentity::from_private_keys(&config.private_keys)?;
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(RunError::HttpClient)?;
        let http = ResourceClient::new(client, config.target_url.clone(), config.method.clone());
        let settings = RunSettings {
            network: config.network.name.to_string(),
            request_count: config.request_count,
            poll_interval: config.poll_interval,
        };
        Buyer::new(settings, http, &identity, provider)
    }
}

impl<R> Buyer<R>
where
    R: Erc20Reader + Send + Sync,
{
    /// Resolves the paying wallet once; every iteration pays from it.
    pub fn new(
        settings: RunSettings,
        http: ResourceClient,
        identity: &SignerIdentity,
        reader: R,
    ) -> Result<Self, RunError> {
        let resolved = identity.resolve()?;
        tracing::info!(wallet = %resolved.address, signer = identity.kind(), "Resolved paying wallet");
        Ok(Self {
            settings,
            http,
            resolver: TokenMetadataResolver::new(reader),
            client: V1Eip155ExactClient::new(resolved.signer),
            wallet: resolved.address,
        })
    }

    pub fn wallet(&self) -> Address {
        self.wallet
    }

    #[tracing::instrument(skip_all, fields(
        url = %self.http.url(),
        method = %self.http.method(),
        network = %self.settings.network,
    ))]
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let total = self.settings.request_count;
        report::log_run_start(self.http.url(), self.http.method(), &self.settings.network, total);

        let mut results = Vec::new();
        let mut totals = SpendAggregate::default();
        for iteration in 1..=total {
            let result = self.iterate(iteration, total).await?;
            report::log_iteration(&result);
            totals.record(&result);
            results.push(result);
            if iteration < total {
                tokio::time::sleep(self.settings.poll_interval).await;
            }
        }

        report::log_totals(&totals);
        Ok(RunReport { results, totals })
    }

    #[tracing::instrument(skip(self), fields(wallet = %self.wallet))]
    async fn iterate(&self, iteration: u32, total: u32) -> Result<IterationResult, RunError> {
        let started = Instant::now();
        let mut result = IterationResult::new(iteration, total, self.http.url().to_string());
        match self.attempt(&mut result).await {
            Ok(()) => {}
            Err(IterationFailure::Fatal(error)) => return Err(error),
            Err(IterationFailure::Recovered(error)) => {
                tracing::error!(%error, "Iteration failed");
                result.status = 0;
                result.error = Some(error.to_string());
            }
        }
        result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(result)
    }

    async fn attempt(&self, result: &mut IterationResult) -> Result<(), IterationFailure> {
        let exchange = match self.http.probe().await? {
            ProbeOutcome::Completed(exchange) => {
                tracing::info!(status = %exchange.status, "Resource served without payment");
                result.record_exchange(exchange);
                return Ok(());
            }
            ProbeOutcome::PaymentRequired(exchange) => exchange,
        };

        let challenge = Challenge::parse(&exchange.body.text).map_err(fatal)?;
        if let Some(reason) = &challenge.error {
            tracing::debug!(%reason, "Challenge carries a server message");
        }
        let requirements = challenge
            .select(&self.settings.network)
            .map_err(fatal)?
            .clone();

        let asset = self.resolver.resolve_asset(&requirements).await;
        let amount = requirements.max_amount_required;
        result.amount_atomic = Some(amount);
        result.amount_formatted = Some(format_units(amount, asset.decimals));
        result.amount_decimals = Some(asset.decimals);
        result.asset = Some(requirements.asset.clone());
        result.asset_symbol = asset.symbol.clone();
        result.network = Some(requirements.network.clone());
        result.requirement = Some(requirements.clone());
        tracing::info!(
            amount = %amount,
            formatted = result.amount_formatted.as_deref().unwrap_or_default(),
            asset = %requirements.asset,
            pay_to = %requirements.pay_to,
            "Payment required"
        );

        let balance_before = match asset.address {
            Some(token) => {
                self.resolver
                    .balance(token, self.wallet, asset.decimals, asset.symbol.clone())
                    .await
            }
            None => None,
        };
        result.balance_before = balance_before.clone();

        let authorization = self
            .client
            .authorize(challenge.x402_version, &requirements)
            .await?;
        let payment = HeaderValue::from_str(&authorization.header)?;
        let settlement = reconcile(
            &self.http,
            &self.resolver,
            payment,
            &asset,
            self.wallet,
            balance_before.as_ref(),
        )
        .await?;

        tracing::info!(
            monotonic_counter.x402_payments_attempted = 1u64,
            network = %requirements.network,
            "Payment sent"
        );
        result.record_exchange(settlement.exchange);
        result.decoded_payment = settlement.confirmation;
        result.balance_after = settlement.balance_after;
        result.balance_diff = settlement.delta;
        if result.is_success() {
            tracing::info!(
                monotonic_counter.x402_payments_accepted = 1u64,
                network = %requirements.network,
                status = result.status,
                "Payment accepted"
            );
        } else {
            tracing::warn!(status = result.status, "Paid request was not accepted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer_local::PrivateKeySigner;
    use async_trait::async_trait;
    use reqwest::Method;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::util::SubscriberInitExt;
    use url::Url;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use x402_chain_eip155::chain::Erc20ReadError;
    use x402_types::util::Base64Bytes;

    const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";
    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    fn paid(iteration: u32, status: u16, asset: &str, amount: u64) -> IterationResult {
        let mut result = IterationResult::new(iteration, 3, "http://localhost/".into());
        result.status = status;
        result.amount_atomic = Some(U256::from(amount));
        result.amount_decimals = Some(6);
        result.asset = Some(asset.into());
        result.asset_symbol = Some("USDC".into());
        result.network = Some("base-sepolia".into());
        result
    }

    #[test]
    fn test_spend_aggregate_counts_successes_only() {
        let mut totals = SpendAggregate::default();
        totals.record(&paid(1, 200, "0xABC", 1_000_000));
        totals.record(&paid(2, 500, "0xabc", 1_000_000));
        let mut errored = paid(3, 200, "0xabc", 1_000_000);
        errored.error = Some("Request failed".into());
        totals.record(&errored);
        totals.record(&paid(4, 201, "0xAbC", 500_000));

        assert_eq!(totals.entries().len(), 1);
        let entry = totals.get("0xabc@base-sepolia").unwrap();
        assert_eq!(entry.raw, U256::from(1_500_000u64));
        assert_eq!(entry.display(), "1.5 USDC");
    }

    #[test]
    fn test_spend_aggregate_keeps_encounter_order() {
        let mut totals = SpendAggregate::default();
        totals.record(&paid(1, 200, "0xbbb", 1));
        totals.record(&paid(2, 200, "0xaaa", 1));
        let keys: Vec<_> = totals.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["0xbbb@base-sepolia", "0xaaa@base-sepolia"]);
    }

    #[test]
    fn test_spend_aggregate_ignores_unpaid_results() {
        let mut totals = SpendAggregate::default();
        let mut free = IterationResult::new(1, 1, "http://localhost/".into());
        free.status = 200;
        totals.record(&free);
        assert!(totals.is_empty());
    }

    #[test]
    fn test_spend_entry_without_symbol() {
        let entry = SpendEntry {
            key: "native@iotex".into(),
            raw: U256::from(42u64),
            decimals: None,
            symbol: None,
        };
        assert_eq!(entry.display(), "42 units");
    }

    #[test]
    fn test_iteration_result_serializes_camel_case() {
        let mut result = paid(1, 200, "0xabc", 1_000_000);
        result.balance_diff = Some(I256::try_from(-5i64).unwrap());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["targetUrl"], "http://localhost/");
        assert_eq!(json["amountAtomic"], "1000000");
        assert_eq!(json["balanceDiff"], "-5");
        assert!(json.get("error").is_none());
        assert!(json.get("balanceBefore").is_none());
    }

    /// Serves balances from a queue; an empty queue fails the read.
    #[derive(Default)]
    struct FakeReader {
        balances: Mutex<VecDeque<u64>>,
    }

    impl FakeReader {
        fn with_balances(balances: &[u64]) -> Self {
            Self {
                balances: Mutex::new(balances.iter().copied().collect()),
            }
        }
    }

    #[async_trait]
    impl Erc20Reader for FakeReader {
        async fn decimals(&self, _token: Address) -> Result<u8, Erc20ReadError> {
            Ok(6)
        }

        async fn symbol(&self, _token: Address) -> Result<String, Erc20ReadError> {
            Ok("USDC".into())
        }

        async fn name(&self, _token: Address) -> Result<String, Erc20ReadError> {
            Ok("USDC".into())
        }

        async fn balance_of(&self, token: Address, _owner: Address) -> Result<U256, Erc20ReadError> {
            self.balances
                .lock()
                .unwrap()
                .pop_front()
                .map(U256::from)
                .ok_or_else(|| Erc20ReadError::new("balanceOf", token, "no balance queued"))
        }
    }

    /// Records the names of `monotonic_counter.*` fields on emitted events.
    #[derive(Clone, Default)]
    struct CounterLog(Arc<Mutex<Vec<&'static str>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CounterLog {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            for field in event.metadata().fields() {
                if let Some(counter) = field.name().strip_prefix("monotonic_counter.") {
                    self.0.lock().unwrap().push(counter);
                }
            }
        }
    }

    fn challenge(asset: &str) -> Value {
        json!({
            "x402Version": 1,
            "accepts": [{
                "scheme": "exact",
                "network": "base-sepolia",
                "maxAmountRequired": "1000000",
                "resource": "https://api.example.com/weather",
                "description": "Weather report",
                "mimeType": "application/json",
                "payTo": PAY_TO,
                "maxTimeoutSeconds": 300,
                "asset": asset,
                "extra": { "name": "USDC", "version": "2", "decimals": 6 }
            }]
        })
    }

    fn settlement_header() -> String {
        SettleResponse {
            success: true,
            transaction: "0x4f5d7e2b1c9a8e3f6d2c1b0a9f8e7d6c5b4a3f2e1d0c9b8a7f6e5d4c3b2a1f0e".into(),
            network: "base-sepolia".into(),
            payer: None,
            error_reason: None,
        }
        .to_header()
        .unwrap()
    }

    fn buyer_at(
        url: &str,
        request_count: u32,
        poll_interval: Duration,
        reader: FakeReader,
    ) -> Buyer<FakeReader> {
        // Unpooled, so no idle-connection timer competes with the paused clock.
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .unwrap();
        let http = ResourceClient::new(client, Url::parse(url).unwrap(), Method::GET);
        let settings = RunSettings {
            network: "base-sepolia".into(),
            request_count,
            poll_interval,
        };
        let identity = SignerIdentity::Account(PrivateKeySigner::random());
        Buyer::new(settings, http, &identity, reader).unwrap()
    }

    fn buyer(server: &MockServer, request_count: u32, reader: FakeReader) -> Buyer<FakeReader> {
        let url = format!("{}/weather", server.uri());
        buyer_at(&url, request_count, Duration::ZERO, reader)
    }

    fn usdc_key() -> String {
        format!("{}@base-sepolia", USDC_BASE_SEPOLIA.to_lowercase())
    }

    async fn mount_challenge(server: &MockServer, asset: &str) {
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(402).set_body_json(challenge(asset)))
            .with_priority(10)
            .mount(server)
            .await;
    }

    async fn mount_free(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"weather": "sunny"})))
            .mount(server)
            .await;
    }

    async fn paid_requests(server: &MockServer) -> Vec<wiremock::Request> {
        server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|request| request.headers.contains_key("X-PAYMENT"))
            .collect()
    }

    #[tokio::test]
    async fn test_free_resource_is_not_paid() {
        let server = MockServer::start().await;
        mount_free(&server).await;

        let report = buyer(&server, 1, FakeReader::default()).run().await.unwrap();

        assert_eq!(report.results.len(), 1);
        let result = &report.results[0];
        assert_eq!(result.status, 200);
        assert_eq!(result.response_body, Some(json!({"weather": "sunny"})));
        assert!(result.requirement.is_none());
        assert!(result.error.is_none());
        assert!(report.totals.is_empty());
        assert!(paid_requests(&server).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_iterations_only() {
        let server = MockServer::start().await;
        mount_free(&server).await;
        let interval = Duration::from_secs(2);
        let url = format!("{}/weather", server.uri());
        let buyer = buyer_at(&url, 3, interval, FakeReader::default());

        let started = tokio::time::Instant::now();
        let report = buyer.run().await.unwrap();

        assert_eq!(report.results.len(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= interval * 2, "slept {elapsed:?}");
        assert!(elapsed < interval * 2 + Duration::from_millis(10), "slept {elapsed:?}");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_iteration_does_not_sleep() {
        let server = MockServer::start().await;
        mount_free(&server).await;
        let url = format!("{}/weather", server.uri());
        let buyer = buyer_at(&url, 1, Duration::from_secs(60), FakeReader::default());

        let started = tokio::time::Instant::now();
        buyer.run().await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_payment_challenge_is_paid_and_reconciled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(header_exists("X-PAYMENT"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-PAYMENT-RESPONSE", settlement_header().as_str())
                    .set_body_json(json!({"weather": "sunny"})),
            )
            .with_priority(1)
            .mount(&server)
            .await;
        mount_challenge(&server, USDC_BASE_SEPOLIA).await;

        let buyer = buyer(&server, 1, FakeReader::with_balances(&[5_000_000, 4_000_000]));
        let report = buyer.run().await.unwrap();

        assert_eq!(report.results.len(), 1);
        let result = &report.results[0];
        assert_eq!(result.status, 200);
        assert!(result.error.is_none());
        assert_eq!(result.amount_atomic, Some(U256::from(1_000_000u64)));
        assert_eq!(result.amount_formatted.as_deref(), Some("1.0"));
        assert_eq!(result.amount_decimals, Some(6));
        assert_eq!(result.asset_symbol.as_deref(), Some("USDC"));
        assert_eq!(result.network.as_deref(), Some("base-sepolia"));
        assert_eq!(result.balance_before.as_ref().unwrap().formatted, "5.0");
        assert_eq!(result.balance_after.as_ref().unwrap().formatted, "4.0");
        assert_eq!(result.balance_diff, Some(I256::try_from(1_000_000i64).unwrap()));
        let confirmation = result.decoded_payment.as_ref().unwrap();
        assert!(confirmation.success);
        assert_eq!(confirmation.network, "base-sepolia");

        let spent = report.totals.get(&usdc_key()).unwrap();
        assert_eq!(spent.raw, U256::from(1_000_000u64));
        assert_eq!(spent.display(), "1.0 USDC");

        let paid = paid_requests(&server).await;
        assert_eq!(paid.len(), 1);
        let header = paid[0].headers.get("X-PAYMENT").unwrap().to_str().unwrap();
        let payload: Value = Base64Bytes::from(header).decode_json().unwrap();
        assert_eq!(payload["x402Version"], 1);
        assert_eq!(payload["scheme"], "exact");
        assert_eq!(payload["network"], "base-sepolia");
        let authorization = &payload["payload"]["authorization"];
        assert_eq!(authorization["value"], "1000000");
        assert_eq!(
            authorization["from"].as_str().unwrap().to_lowercase(),
            format!("{:#x}", buyer.wallet())
        );
        assert_eq!(
            paid[0]
                .headers
                .get("Access-Control-Expose-Headers")
                .unwrap()
                .to_str()
                .unwrap(),
            "X-PAYMENT-RESPONSE"
        );
    }

    #[tokio::test]
    async fn test_undecodable_settlement_header_is_kept_raw() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(header_exists("X-PAYMENT"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-PAYMENT-RESPONSE", "not-a-settlement")
                    .set_body_json(json!({"weather": "sunny"})),
            )
            .with_priority(1)
            .mount(&server)
            .await;
        mount_challenge(&server, USDC_BASE_SEPOLIA).await;

        let report = buyer(&server, 1, FakeReader::default()).run().await.unwrap();

        let result = &report.results[0];
        assert_eq!(result.status, 200);
        assert!(result.error.is_none());
        assert!(result.decoded_payment.is_none());
        assert_eq!(result.payment_response_header.as_deref(), Some("not-a-settlement"));
        assert_eq!(
            report.totals.get(&usdc_key()).unwrap().raw,
            U256::from(1_000_000u64)
        );
    }

    #[tokio::test]
    async fn test_failed_paid_retry_is_excluded_from_totals() {
        let server = MockServer::start().await;
        for (priority, status) in [(1, 200), (2, 500), (3, 200)] {
            Mock::given(method("GET"))
                .and(path("/weather"))
                .and(header_exists("X-PAYMENT"))
                .respond_with(ResponseTemplate::new(status))
                .up_to_n_times(1)
                .with_priority(priority)
                .mount(&server)
                .await;
        }
        mount_challenge(&server, USDC_BASE_SEPOLIA).await;

        let report = buyer(&server, 3, FakeReader::default()).run().await.unwrap();

        let statuses: Vec<u16> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, [200, 500, 200]);
        let iterations: Vec<u32> = report.results.iter().map(|r| r.iteration).collect();
        assert_eq!(iterations, [1, 2, 3]);
        assert!(report.results.iter().all(|r| r.total == 3));
        assert!(report.results.iter().all(|r| r.balance_diff.is_none()));

        assert_eq!(report.totals.entries().len(), 1);
        assert_eq!(
            report.totals.get(&usdc_key()).unwrap().raw,
            U256::from(2_000_000u64)
        );
        assert_eq!(paid_requests(&server).await.len(), 3);
    }

    #[tokio::test]
    async fn test_rejected_payment_is_counted_as_attempt_only() {
        let server = MockServer::start().await;
        for (priority, status) in [(1, 200), (2, 500)] {
            Mock::given(method("GET"))
                .and(path("/weather"))
                .and(header_exists("X-PAYMENT"))
                .respond_with(ResponseTemplate::new(status))
                .up_to_n_times(1)
                .with_priority(priority)
                .mount(&server)
                .await;
        }
        mount_challenge(&server, USDC_BASE_SEPOLIA).await;
        let counters = CounterLog::default();
        let _guard = tracing_subscriber::registry()
            .with(counters.clone())
            .set_default();

        buyer(&server, 2, FakeReader::default()).run().await.unwrap();

        assert_eq!(
            *counters.0.lock().unwrap(),
            [
                "x402_payments_attempted",
                "x402_payments_accepted",
                "x402_payments_attempted"
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_accepts_fails_without_paying() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(
                ResponseTemplate::new(402).set_body_json(json!({"x402Version": 1, "accepts": []})),
            )
            .mount(&server)
            .await;

        let err = buyer(&server, 2, FakeReader::default()).run().await.unwrap_err();

        assert!(matches!(err, RunError::Selection(_)));
        assert!(paid_requests(&server).await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_challenge_fails_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(402).set_body_string("Payment Required"))
            .mount(&server)
            .await;

        let err = buyer(&server, 1, FakeReader::default()).run().await.unwrap_err();

        assert!(matches!(err, RunError::Challenge(_)));
        assert!(paid_requests(&server).await.is_empty());
    }

    #[tokio::test]
    async fn test_signing_failure_is_recorded_and_run_continues() {
        let server = MockServer::start().await;
        mount_challenge(&server, "usdc").await;

        let report = buyer(&server, 2, FakeReader::default()).run().await.unwrap();

        assert_eq!(report.results.len(), 2);
        for result in &report.results {
            assert_eq!(result.status, 0);
            assert!(result.error.as_deref().unwrap().contains("asset"));
            assert_eq!(result.amount_formatted.as_deref(), Some("1.0"));
        }
        assert!(report.totals.is_empty());
        assert!(paid_requests(&server).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_yields_status_zero() {
        let buyer = buyer_at(
            "http://127.0.0.1:9/weather",
            1,
            Duration::ZERO,
            FakeReader::default(),
        );

        let report = buyer.run().await.unwrap();

        assert_eq!(report.results[0].status, 0);
        assert!(report.results[0].error.is_some());
    }

    #[tokio::test]
    async fn test_non_evm_signer_fails_at_init() {
        let server = MockServer::start().await;
        let url = Url::parse(&format!("{}/weather", server.uri())).unwrap();
        let http = ResourceClient::new(reqwest::Client::new(), url, Method::GET);
        let settings = RunSettings {
            network: "base-sepolia".into(),
            request_count: 1,
            poll_interval: Duration::ZERO,
        };
        let identity = SignerIdentity::Unsupported {
            kind: "solana".into(),
        };

        let err = Buyer::new(settings, http, &identity, FakeReader::default())
            .err()
            .unwrap();

        assert!(matches!(err, RunError::Signer(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
