//! Logging and OpenTelemetry export.
//!
//! Logs always go to stderr through a `fmt` layer filtered by `RUST_LOG` (default `info`),
//! so stdout stays reserved for the JSON report. When any `OTEL_EXPORTER_OTLP_*` variable
//! is set, spans and `monotonic_counter.*` events are exported over OTLP as well.

use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_sdk::{
    Resource,
    metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider},
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION},
};
use std::env;
use std::error::Error;
use std::time::Duration;
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

type ExporterError = Box<dyn Error + Send + Sync>;

/// Telemetry protocol to use for OTLP export
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TelemetryProtocol {
    HTTP,
    GRPC,
}

impl TelemetryProtocol {
    /// Determines telemetry protocol from environment variables if OTEL is configured
    pub fn from_env() -> Option<Self> {
        let is_enabled = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_HEADERS").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_PROTOCOL").is_ok();
        if !is_enabled {
            return None;
        }
        let protocol = env::var("OTEL_EXPORTER_OTLP_PROTOCOL").ok();
        Some(Self::parse(protocol.as_deref()))
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("grpc") => TelemetryProtocol::GRPC,
            _ => TelemetryProtocol::HTTP,
        }
    }
}

/// `RUST_LOG`, or `info` when it is unset or unparsable.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Generates a semantic OpenTelemetry `Resource` describing this run
fn resource() -> Resource {
    let deployment_env = env::var("DEPLOYMENT_ENV").unwrap_or_else(|_| "develop".to_string());
    Resource::builder()
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_schema_url(
            [
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
            ],
            SCHEMA_URL,
        )
        .build()
}

fn init_meter_provider(
    telemetry_protocol: TelemetryProtocol,
) -> Result<SdkMeterProvider, ExporterError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder();
    let exporter = match telemetry_protocol {
        TelemetryProtocol::HTTP => exporter
            .with_http()
            .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
            .build()?,
        TelemetryProtocol::GRPC => exporter
            .with_tonic()
            .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
            .build()?,
    };

    // The final collection happens on shutdown.
    let reader = PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(30))
        .build();

    let meter_provider = MeterProviderBuilder::default()
        .with_resource(resource())
        .with_reader(reader)
        .build();

    global::set_meter_provider(meter_provider.clone());

    Ok(meter_provider)
}

fn init_tracer_provider(
    telemetry_protocol: TelemetryProtocol,
) -> Result<SdkTracerProvider, ExporterError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder();
    let exporter = match telemetry_protocol {
        TelemetryProtocol::HTTP => exporter.with_http().build()?,
        TelemetryProtocol::GRPC => exporter.with_tonic().build()?,
    };

    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            1.0,
        ))))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

/// Wrapper for telemetry providers, for graceful shutdown
pub struct Telemetry {
    pub tracer_provider: Option<SdkTracerProvider>,
    pub meter_provider: Option<SdkMeterProvider>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    /// Installs the global subscriber. Exporter setup failures degrade to local logging.
    pub fn new() -> Self {
        let Some(telemetry_protocol) = TelemetryProtocol::from_env() else {
            Self::init_local();
            tracing::debug!("OpenTelemetry is not enabled");
            return Self::local();
        };
        let providers = init_tracer_provider(telemetry_protocol).and_then(|tracer_provider| {
            init_meter_provider(telemetry_protocol).map(|meter| (tracer_provider, meter))
        });
        match providers {
            Ok((tracer_provider, meter_provider)) => {
                let tracer = tracer_provider.tracer("x402-buyer");
                tracing_subscriber::registry()
                    .with(env_filter())
                    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                    .with(MetricsLayer::new(meter_provider.clone()))
                    .with(OpenTelemetryLayer::new(tracer))
                    .init();
                tracing::info!(
                    "OpenTelemetry tracing and metrics exporter is enabled via {:?}",
                    telemetry_protocol
                );
                Self {
                    tracer_provider: Some(tracer_provider),
                    meter_provider: Some(meter_provider),
                }
            }
            Err(error) => {
                Self::init_local();
                tracing::warn!(%error, "Failed to build OTLP exporter, logging locally only");
                Self::local()
            }
        }
    }

    fn init_local() {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    fn local() -> Self {
        Self {
            tracer_provider: None,
            meter_provider: None,
        }
    }
}

/// Graceful shutdown for Telemetry.
impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(tracer_provider) = self.tracer_provider.as_ref() {
            if let Err(err) = tracer_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
        if let Some(meter_provider) = self.meter_provider.as_ref() {
            if let Err(err) = meter_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
    }
}
