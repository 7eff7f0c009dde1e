//! Protocol version 1 (V1) types for x402.
//!
//! V1 identifies networks by name (e.g., "base-sepolia") rather than by CAIP-2 chain ID.
//!
//! # Key Types
//!
//! - [`PaymentRequired`] - HTTP 402 response body
//! - [`PaymentRequirements`] - Payment terms set by the seller
//! - [`PaymentExtra`] - Open, scheme-specific hints attached to the terms
//! - [`PaymentPayload`] - Signed payment authorization from the buyer
//! - [`SettleResponse`] - Settlement confirmation returned by the seller

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Number, Value};

use crate::util::token_amount::decimal_u256;
use crate::util::{Base64Bytes, Base64JsonError};

/// HTTP 402 Payment Required response body.
///
/// Candidates in `accepts` are kept as raw JSON so that each one can be validated
/// on its own and reported by position.
///
/// ```json
/// {
///   "x402Version": 1,
///   "accepts": [{ "scheme": "exact", "network": "base-sepolia", "...": "..." }]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version announced by the server. Echoed back in the payment payload.
    ///
    /// Any integer-valued JSON number is accepted, so `1.0` reads as version 1.
    #[serde(deserialize_with = "integer_version")]
    pub x402_version: u32,
    /// Acceptable payment terms, in the server's order of preference.
    pub accepts: Vec<Value>,
    /// Optional error message if the previous payment was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn integer_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let number = Number::deserialize(deserializer)?;
    if let Some(version) = number.as_u64() {
        return u32::try_from(version)
            .map_err(|_| de::Error::custom(format!("x402Version {number} is out of range")));
    }
    match number.as_f64() {
        Some(version)
            if version.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&version) =>
        {
            Ok(version as u32)
        }
        _ => Err(de::Error::custom(format!(
            "x402Version must be a non-negative integer, got {number}"
        ))),
    }
}

/// Payment requirements set by the seller.
///
/// `scheme` and `network` are free strings here: a well-formed candidate for a
/// scheme or network the buyer does not support is not an error, it is simply
/// never selected.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme (e.g., "exact").
    pub scheme: String,
    /// The network name (e.g., "base-sepolia").
    pub network: String,
    /// The amount to pay, in the asset's smallest unit.
    #[serde(with = "decimal_u256")]
    pub max_amount_required: U256,
    /// The resource URL being paid for.
    #[serde(default)]
    pub resource: String,
    /// Human-readable description of the resource.
    #[serde(default)]
    pub description: String,
    /// MIME type of the resource.
    #[serde(default)]
    pub mime_type: String,
    /// Optional JSON schema for the resource output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// The recipient address for payment.
    pub pay_to: String,
    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,
    /// The token: a contract address, or a symbolic identifier.
    pub asset: String,
    /// Scheme-specific extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<PaymentExtra>,
}

/// A single candidate in `accepts` does not describe valid payment terms.
#[derive(Debug, thiserror::Error)]
pub enum InvalidRequirementsError {
    #[error(transparent)]
    Schema(#[from] serde_json::Error),
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
}

impl TryFrom<&Value> for PaymentRequirements {
    type Error = InvalidRequirementsError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let requirements = PaymentRequirements::deserialize(value)?;
        let required = [
            ("scheme", &requirements.scheme),
            ("network", &requirements.network),
            ("asset", &requirements.asset),
            ("payTo", &requirements.pay_to),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(InvalidRequirementsError::EmptyField(*field));
        }
        Ok(requirements)
    }
}

impl PaymentRequirements {
    pub fn extra(&self) -> Option<&PaymentExtra> {
        self.extra.as_ref()
    }
}

/// Open key/value bag sent alongside payment requirements.
///
/// Servers put token hints (`decimals`, `symbol`) and the EIP-712 domain
/// (`name`, `version`) here. Unknown keys are preserved.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentExtra(pub Map<String, Value>);

impl PaymentExtra {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Token decimals from `decimals`, then `tokenDecimals`.
    ///
    /// Either key may hold a number or a numeric string.
    pub fn decimals(&self) -> Option<u8> {
        ["decimals", "tokenDecimals"]
            .iter()
            .filter_map(|key| self.get(key))
            .find_map(|value| match value {
                Value::Number(n) => n
                    .as_u64()
                    .or_else(|| {
                        n.as_f64()
                            .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                            .map(|f| f as u64)
                    })
                    .and_then(|n| u8::try_from(n).ok()),
                Value::String(s) => s.trim().parse::<u8>().ok(),
                _ => None,
            })
    }

    /// First non-blank of `symbol`, `ticker`, `code`, `name`.
    pub fn symbol(&self) -> Option<&str> {
        ["symbol", "ticker", "code", "name"]
            .iter()
            .filter_map(|key| self.get(key)?.as_str())
            .find(|s| !s.trim().is_empty())
    }

    /// EIP-712 domain name of the token contract.
    pub fn eip712_name(&self) -> Option<&str> {
        self.get("name")?.as_str()
    }

    /// EIP-712 domain version of the token contract.
    pub fn eip712_version(&self) -> Option<&str> {
        self.get("version")?.as_str()
    }
}

/// A signed payment authorization from the buyer.
///
/// # Type Parameters
///
/// - `TScheme` - The scheme identifier type (default: `String`)
/// - `TPayload` - The scheme-specific payload type (default: raw JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TScheme = String, TPayload = Value> {
    /// Protocol version, copied from the challenge.
    pub x402_version: u32,
    /// The payment scheme (e.g., "exact").
    pub scheme: TScheme,
    /// The network name (e.g., "base-sepolia").
    pub network: String,
    /// The scheme-specific signed payload.
    pub payload: TPayload,
}

impl<TScheme: Serialize, TPayload: Serialize> PaymentPayload<TScheme, TPayload> {
    /// Encodes the payload as the value of the `X-PAYMENT` header.
    pub fn to_header(&self) -> Result<String, serde_json::Error> {
        Ok(Base64Bytes::encode_json(self)?.to_string())
    }
}

/// Settlement confirmation carried in the `X-PAYMENT-RESPONSE` header.
///
/// ```
/// use x402_types::proto::v1::SettleResponse;
///
/// let settled = SettleResponse {
///     success: true,
///     transaction: "0xabc".into(),
///     network: "base-sepolia".into(),
///     payer: None,
///     error_reason: None,
/// };
/// let header = settled.to_header().unwrap();
/// assert_eq!(SettleResponse::from_header(&header).unwrap(), settled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    /// Transaction hash of the settlement.
    #[serde(default)]
    pub transaction: String,
    #[serde(default)]
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, alias = "error_reason", skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl SettleResponse {
    /// Decodes the base64 JSON value of an `X-PAYMENT-RESPONSE` header.
    pub fn from_header(header: &str) -> Result<Self, Base64JsonError> {
        Base64Bytes::from(header).decode_json()
    }

    pub fn to_header(&self) -> Result<String, serde_json::Error> {
        Ok(Base64Bytes::encode_json(self)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate() -> Value {
        json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "maxAmountRequired": "1000000",
            "resource": "https://api.example.com/weather",
            "description": "Weather report",
            "mimeType": "application/json",
            "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
            "maxTimeoutSeconds": 60,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "extra": { "name": "USDC", "version": "2", "decimals": 6 }
        })
    }

    #[test]
    fn test_version_accepts_integer_valued_numbers() {
        let parse = |version: Value| {
            serde_json::from_value::<PaymentRequired>(
                json!({ "x402Version": version, "accepts": [] }),
            )
        };
        assert_eq!(parse(json!(1)).unwrap().x402_version, 1);
        assert_eq!(parse(json!(1.0)).unwrap().x402_version, 1);
        assert_eq!(parse(json!(300)).unwrap().x402_version, 300);
        assert!(parse(json!(1.5)).is_err());
        assert!(parse(json!(-1)).is_err());
        assert!(parse(json!("1")).is_err());
    }

    #[test]
    fn test_requirements_from_json() {
        let requirements = PaymentRequirements::try_from(&candidate()).unwrap();
        assert_eq!(requirements.scheme, "exact");
        assert_eq!(requirements.max_amount_required, U256::from(1_000_000u64));
        assert_eq!(requirements.max_timeout_seconds, 60);
        let extra = requirements.extra().unwrap();
        assert_eq!(extra.decimals(), Some(6));
        assert_eq!(extra.eip712_name(), Some("USDC"));
        assert_eq!(extra.eip712_version(), Some("2"));
    }

    #[test]
    fn test_requirements_optional_fields_default() {
        let mut value = candidate();
        let object = value.as_object_mut().unwrap();
        object.remove("resource");
        object.remove("description");
        object.remove("mimeType");
        object.remove("extra");
        let requirements = PaymentRequirements::try_from(&value).unwrap();
        assert_eq!(requirements.resource, "");
        assert!(requirements.extra.is_none());
        assert!(requirements.output_schema.is_none());
    }

    #[test]
    fn test_requirements_reject_bad_amount() {
        for amount in [json!("1.5"), json!(""), json!("-1"), json!(1000000)] {
            let mut value = candidate();
            value["maxAmountRequired"] = amount;
            assert!(matches!(
                PaymentRequirements::try_from(&value),
                Err(InvalidRequirementsError::Schema(_))
            ));
        }
    }

    #[test]
    fn test_requirements_reject_empty_pay_to() {
        let mut value = candidate();
        value["payTo"] = json!("  ");
        assert!(matches!(
            PaymentRequirements::try_from(&value),
            Err(InvalidRequirementsError::EmptyField("payTo"))
        ));
    }

    #[test]
    fn test_requirements_reject_non_object_extra() {
        let mut value = candidate();
        value["extra"] = json!("usdc");
        assert!(PaymentRequirements::try_from(&value).is_err());
    }

    #[test]
    fn test_requirements_reject_missing_timeout() {
        let mut value = candidate();
        value.as_object_mut().unwrap().remove("maxTimeoutSeconds");
        assert!(PaymentRequirements::try_from(&value).is_err());
    }

    #[test]
    fn test_extra_decimals_sources() {
        let extra: PaymentExtra = serde_json::from_value(json!({"tokenDecimals": "18"})).unwrap();
        assert_eq!(extra.decimals(), Some(18));
        let extra: PaymentExtra =
            serde_json::from_value(json!({"decimals": "six", "tokenDecimals": 8})).unwrap();
        assert_eq!(extra.decimals(), Some(8));
        let extra: PaymentExtra = serde_json::from_value(json!({})).unwrap();
        assert_eq!(extra.decimals(), None);
    }

    #[test]
    fn test_extra_symbol_priority() {
        let extra: PaymentExtra =
            serde_json::from_value(json!({"symbol": " ", "ticker": "USDC", "name": "USD Coin"}))
                .unwrap();
        assert_eq!(extra.symbol(), Some("USDC"));
        let extra: PaymentExtra = serde_json::from_value(json!({"name": "USD Coin"})).unwrap();
        assert_eq!(extra.symbol(), Some("USD Coin"));
    }

    #[test]
    fn test_payment_required_requires_accepts() {
        assert!(serde_json::from_value::<PaymentRequired>(json!({"x402Version": 1})).is_err());
        assert!(
            serde_json::from_value::<PaymentRequired>(json!({"x402Version": 1, "accepts": {}}))
                .is_err()
        );
        let challenge: PaymentRequired =
            serde_json::from_value(json!({"x402Version": 1, "accepts": [candidate()]})).unwrap();
        assert_eq!(challenge.accepts.len(), 1);
    }

    #[test]
    fn test_settle_response_accepts_snake_case_reason() {
        let header = Base64Bytes::encode_json(&json!({
            "success": false,
            "network": "base",
            "error_reason": "insufficient_funds"
        }))
        .unwrap()
        .to_string();
        let settled = SettleResponse::from_header(&header).unwrap();
        assert!(!settled.success);
        assert_eq!(settled.error_reason.as_deref(), Some("insufficient_funds"));
        assert_eq!(settled.transaction, "");
    }
}
