//! Utility types and functions for x402.
//!
//! - [`b64`] - Base64 encoding/decoding, including base64 JSON header values
//! - [`lit_str`] - Compile-time string literal types
//! - [`token_amount`] - Atomic token amounts to and from decimal strings

pub mod b64;
pub mod lit_str;
pub mod token_amount;

pub use b64::*;
pub use token_amount::{ParseUnitsError, format_units, parse_units};
