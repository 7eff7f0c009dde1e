//! Atomic token amounts and their human-readable decimal form.
//!
//! On the wire, `maxAmountRequired` is an unsigned integer in the token's smallest
//! unit, written as a decimal string of arbitrary length. It is held as a [`U256`]
//! and never passes through a float.
//!
//! ```
//! use alloy_primitives::U256;
//! use x402_types::util::{format_units, parse_units};
//!
//! assert_eq!(format_units(U256::from(1_000_000u64), 6), "1.0");
//! assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
//! assert_eq!(parse_units("0.01", 6).unwrap(), U256::from(10_000u64));
//! ```

use alloy_primitives::U256;

/// Errors from [`parse_units`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseUnitsError {
    #[error("Amount is not a decimal number: {0:?}")]
    Invalid(String),
    #[error("Amount {amount:?} has more than {decimals} fractional digits")]
    TooPrecise { amount: String, decimals: u8 },
    #[error("Amount {0:?} does not fit in 256 bits")]
    Overflow(String),
}

/// Renders an atomic amount as a decimal string with `decimals` fractional digits.
///
/// Trailing fractional zeros are dropped but one fractional digit is always kept,
/// so `1000000` with six decimals is `"1.0"` and zero is `"0.0"`.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (integer, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{integer}.0")
    } else {
        format!("{integer}.{fraction}")
    }
}

/// Parses a decimal string into an atomic amount with `decimals` fractional digits.
///
/// Accepts an integer part with an optional fraction. Fractional digits beyond
/// `decimals` are rejected unless they are zeros.
pub fn parse_units(input: &str, decimals: u8) -> Result<U256, ParseUnitsError> {
    let input = input.trim();
    let invalid = || ParseUnitsError::Invalid(input.to_string());
    let (integer, fraction) = match input.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (input, ""),
    };
    if integer.is_empty() || !is_digits(integer) || !(fraction.is_empty() || is_digits(fraction))
    {
        return Err(invalid());
    }
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(ParseUnitsError::TooPrecise {
            amount: input.to_string(),
            decimals,
        });
    }
    let atomic = format!(
        "{integer}{fraction}{}",
        "0".repeat(decimals as usize - fraction.len())
    );
    U256::from_str_radix(&atomic, 10).map_err(|_| ParseUnitsError::Overflow(input.to_string()))
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

/// Serde helpers for a [`U256`] written as a non-empty string of decimal digits.
///
/// ```
/// use alloy_primitives::U256;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Price {
///     #[serde(with = "x402_types::util::token_amount::decimal_u256")]
///     amount: U256,
/// }
///
/// let price: Price = serde_json::from_str(r#"{"amount":"1000000"}"#).unwrap();
/// assert_eq!(price.amount, U256::from(1_000_000u64));
/// assert!(serde_json::from_str::<Price>(r#"{"amount":"1e6"}"#).is_err());
/// ```
pub mod decimal_u256 {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() || !super::is_digits(&s) {
            return Err(de::Error::custom(format!(
                "expected a decimal integer string, got {s:?}"
            )));
        }
        U256::from_str_radix(&s, 10).map_err(de::Error::custom)
    }
}
