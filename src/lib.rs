//! A buyer for the [x402 protocol](https://www.x402.org).
//!
//! `x402-buyer` exercises an x402-protected endpoint the way a paying client would: it sends
//! the request, answers a `402 Payment Required` challenge with a signed ERC-3009 authorization,
//! retries, and reports what the payment cost, including the on-chain balance change.
//!
//! # Modules
//!
//! - [`config`] - CLI and environment configuration of a run.
//! - [`probe`] - The unpaid request and the HTTP plumbing shared with the paid retry.
//! - [`select`] - Parsing the 402 challenge and choosing the payment terms.
//! - [`reconcile`] - The paid retry, the settlement header and the balance delta.
//! - [`runner`] - The run loop and the aggregated spend.
//! - [`report`] - Log summaries and the JSON envelope printed at the end.
//! - [`telemetry`] - `tracing` subscriber and OpenTelemetry export.
//!
//! Wire types live in `x402-types`, EVM signing and token reads in `x402-chain-eip155`.

pub mod config;
pub mod probe;
pub mod reconcile;
pub mod report;
pub mod runner;
pub mod select;
pub mod telemetry;
