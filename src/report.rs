//! Human-readable run summaries, emitted through `tracing`.

use alloy_primitives::I256;
use reqwest::Method;
use serde::Serialize;
use std::borrow::Cow;
use url::Url;
use x402_types::util::format_units;

use crate::runner::{IterationResult, RunReport, SpendAggregate};

const TRANSACTION_PREVIEW_CHARS: usize = 18;
const BODY_PREVIEW_CHARS: usize = 500;

/// Cuts `value` to `max` characters, marking the cut with `…`.
pub fn truncate(value: &str, max: usize) -> Cow<'_, str> {
    match value.char_indices().nth(max) {
        Some((cut, _)) => Cow::Owned(format!("{}…", &value[..cut])),
        None => Cow::Borrowed(value),
    }
}

/// Balance delta as seen by the payer: `-` when funds were spent, `+` when received.
pub fn format_delta(delta: I256, decimals: u8) -> String {
    let sign = if delta.is_negative() { "+" } else { "-" };
    format!("{sign}{}", format_units(delta.unsigned_abs(), decimals))
}

pub fn log_run_start(url: &Url, method: &Method, network: &str, total: u32) {
    tracing::info!(%url, %method, network, requests = total, "Starting x402 payment run");
}

pub fn log_iteration(result: &IterationResult) {
    let progress = format!("{}/{}", result.iteration, result.total);
    if let Some(error) = &result.error {
        tracing::error!(
            iteration = %progress,
            duration_ms = result.duration_ms,
            %error,
            "Request failed"
        );
        return;
    }

    tracing::info!(
        iteration = %progress,
        status = result.status,
        duration_ms = result.duration_ms,
        "Request completed"
    );
    if let (Some(amount), Some(network)) = (&result.amount_formatted, &result.network) {
        let symbol = result
            .asset_symbol
            .as_deref()
            .or(result.asset.as_deref())
            .unwrap_or("units");
        tracing::info!(iteration = %progress, "Paid {amount} {symbol} on {network}");
    }
    if let (Some(before), Some(after)) = (&result.balance_before, &result.balance_after) {
        let delta = match (result.balance_diff, result.amount_decimals) {
            (Some(delta), Some(decimals)) => format_delta(delta, decimals),
            _ => "n/a".to_string(),
        };
        tracing::info!(
            iteration = %progress,
            before = %before.formatted,
            after = %after.formatted,
            %delta,
            "Balance change"
        );
    }
    if let Some(payment) = &result.decoded_payment {
        tracing::info!(
            iteration = %progress,
            success = payment.success,
            transaction = %truncate(&payment.transaction, TRANSACTION_PREVIEW_CHARS),
            network = %payment.network,
            error_reason = payment.error_reason.as_deref(),
            "Settlement"
        );
    }
    if let Some(text) = result.response_text.as_deref().filter(|t| !t.is_empty()) {
        tracing::debug!(
            iteration = %progress,
            body = %truncate(text, BODY_PREVIEW_CHARS),
            "Response body"
        );
    }
}

pub fn log_totals(totals: &SpendAggregate) {
    if totals.is_empty() {
        tracing::info!("No successful paid requests");
        return;
    }
    for entry in totals.entries() {
        tracing::info!(key = %entry.key, total = %entry.display(), "Total spent");
    }
}

/// The JSON document printed on stdout at the end of a run.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope<'a> {
    Success {
        success: bool,
        data: &'a RunReport,
        message: &'static str,
    },
    Failure {
        success: bool,
        error: String,
        message: &'static str,
    },
}

impl<'a> Envelope<'a> {
    pub fn success(data: &'a RunReport) -> Self {
        Envelope::Success {
            success: true,
            data,
            message: "x402 payment test completed successfully",
        }
    }

    pub fn failure(error: &dyn std::error::Error) -> Self {
        Envelope::Failure {
            success: false,
            error: error.to_string(),
            message: "x402 payment test failed",
        }
    }
}
