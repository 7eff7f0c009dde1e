//! Core types for the buyer side of the x402 payment protocol.
//!
//! When a client requests a paid resource, the server answers `402 Payment Required`
//! with a JSON body listing the payment terms it accepts. The client picks one,
//! signs an authorization, and retries the request carrying it in the `X-PAYMENT`
//! header. A server that accepted the payment may report the settlement back in
//! the `X-PAYMENT-RESPONSE` header.
//!
//! # Modules
//!
//! - [`chain`] - CAIP-2 chain identifiers
//! - [`networks`] - Registry of the networks a buyer may pay on
//! - [`proto`] - Wire format types for challenges, payloads and settlement responses
//! - [`timestamp`] - Unix timestamps for authorization validity windows
//! - [`util`] - Base64 helpers and atomic token amount formatting

pub mod chain;
pub mod networks;
pub mod proto;
pub mod timestamp;
pub mod util;
