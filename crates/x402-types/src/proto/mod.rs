//! Protocol types for x402 payment messages.
//!
//! The buyer speaks protocol version 1 ([`v1`]): a `402 Payment Required` body lists
//! the acceptable [`v1::PaymentRequirements`], the retried request carries a base64
//! encoded [`v1::PaymentPayload`] in [`X_PAYMENT_HEADER`], and the server may answer
//! with a base64 encoded [`v1::SettleResponse`] in [`X_PAYMENT_RESPONSE_HEADER`].
//!
//! All types serialize to JSON using camelCase field names.

pub mod v1;

/// Request header carrying the signed payment payload.
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Response header carrying the settlement confirmation.
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// CORS header the buyer sends so browsers may read [`X_PAYMENT_RESPONSE_HEADER`].
pub const ACCESS_CONTROL_EXPOSE_HEADERS: &str = "Access-Control-Expose-Headers";

/// The only payment scheme the buyer can sign for.
pub const EXACT_SCHEME: &str = "exact";
