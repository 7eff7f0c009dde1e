//! Parsing a 402 challenge and choosing what to pay.

use x402_types::proto::EXACT_SCHEME;
use x402_types::proto::v1::{InvalidRequirementsError, PaymentRequired, PaymentRequirements};

/// The 402 body could not be turned into payment terms.
#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    #[error("Malformed 402 response: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("Invalid payment requirements at accepts[{index}]: {source}")]
    InvalidCandidate {
        index: usize,
        #[source]
        source: InvalidRequirementsError,
    },
}

/// No offered payment terms match what the buyer can pay.
#[derive(Debug, thiserror::Error)]
#[error("No payment requirements found for network {network} with scheme {scheme}")]
pub struct SelectionError {
    pub network: String,
    pub scheme: String,
}

/// A validated 402 challenge.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub x402_version: u32,
    /// Every offered candidate, in the server's order.
    pub accepts: Vec<PaymentRequirements>,
    pub error: Option<String>,
}

impl Challenge {
    /// Parses a 402 body. The first invalid candidate fails the whole challenge.
    pub fn parse(body: &str) -> Result<Self, ChallengeError> {
        let payment_required: PaymentRequired =
            serde_json::from_str(body).map_err(ChallengeError::Malformed)?;
        let accepts = payment_required
            .accepts
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                PaymentRequirements::try_from(candidate)
                    .map_err(|source| ChallengeError::InvalidCandidate { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            x402_version: payment_required.x402_version,
            accepts,
            error: payment_required.error,
        })
    }

    /// The first `exact` candidate for `network`.
    pub fn select(&self, network: &str) -> Result<&PaymentRequirements, SelectionError> {
        select_requirements(&self.accepts, network, EXACT_SCHEME)
    }
}

/// The first candidate, in list order, with the given scheme and network.
pub fn select_requirements<'a>(
    candidates: &'a [PaymentRequirements],
    network: &str,
    scheme: &str,
) -> Result<&'a PaymentRequirements, SelectionError> {
    candidates
        .iter()
        .find(|candidate| candidate.scheme == scheme && candidate.network == network)
        .ok_or_else(|| SelectionError {
            network: network.to_string(),
            scheme: scheme.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn candidate(scheme: &str, network: &str, pay_to: &str) -> Value {
        json!({
            "scheme": scheme,
            "network": network,
            "maxAmountRequired": "1000000",
            "resource": "https://api.example.com/weather",
            "description": "Weather report",
            "mimeType": "application/json",
            "payTo": pay_to,
            "maxTimeoutSeconds": 300,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "extra": { "name": "USDC", "version": "2", "decimals": 6 }
        })
    }

    fn body(accepts: Vec<Value>) -> String {
        json!({ "x402Version": 1, "accepts": accepts }).to_string()
    }

    #[test]
    fn test_selects_first_matching_candidate() {
        let challenge = Challenge::parse(&body(vec![
            candidate("upto", "base-sepolia", "0x01"),
            candidate("exact", "base", "0x02"),
            candidate("exact", "base-sepolia", "0x03"),
            candidate("exact", "base-sepolia", "0x04"),
        ]))
        .unwrap();
        assert_eq!(challenge.x402_version, 1);
        assert_eq!(challenge.accepts.len(), 4);
        assert_eq!(challenge.select("base-sepolia").unwrap().pay_to, "0x03");
    }

    #[test]
    fn test_empty_accepts_has_no_selection() {
        let challenge = Challenge::parse(&body(vec![])).unwrap();
        let err = challenge.select("base-sepolia").unwrap_err();
        assert_eq!(
            err.to_string(),
            "No payment requirements found for network base-sepolia with scheme exact"
        );
    }

    #[test]
    fn test_no_candidate_for_network() {
        let challenge = Challenge::parse(&body(vec![candidate("exact", "base", "0x01")])).unwrap();
        let err = challenge.select("polygon").unwrap_err();
        assert_eq!(err.network, "polygon");
        assert_eq!(err.scheme, "exact");
    }

    #[test]
    fn test_invalid_candidate_fails_fast_with_index() {
        let mut broken = candidate("exact", "base-sepolia", "0x02");
        broken["maxAmountRequired"] = json!("1.5");
        let err = Challenge::parse(&body(vec![
            candidate("exact", "base-sepolia", "0x01"),
            broken,
            json!({ "scheme": "exact" }),
        ]))
        .unwrap_err();
        assert!(matches!(err, ChallengeError::InvalidCandidate { index: 1, .. }));
    }

    #[test]
    fn test_empty_pay_to_is_invalid() {
        let err = Challenge::parse(&body(vec![candidate("exact", "base-sepolia", " ")])).unwrap_err();
        assert!(err.to_string().contains("payTo"));
    }

    #[test]
    fn test_malformed_bodies() {
        for raw in ["", "not json", r#"{"x402Version":1}"#, r#"{"x402Version":1,"accepts":{}}"#] {
            let err = Challenge::parse(raw).unwrap_err();
            assert!(matches!(err, ChallengeError::Malformed(_)), "{raw}");
        }
    }

    #[test]
    fn test_float_version_is_accepted() {
        let raw = json!({
            "x402Version": 1.0,
            "accepts": [candidate("exact", "base-sepolia", "0x01")]
        })
        .to_string();
        let challenge = Challenge::parse(&raw).unwrap();
        assert_eq!(challenge.x402_version, 1);
        assert_eq!(challenge.select("base-sepolia").unwrap().pay_to, "0x01");
    }

    #[test]
    fn test_server_error_is_kept() {
        let raw = json!({
            "x402Version": 1,
            "accepts": [candidate("exact", "base", "0x01")],
            "error": "X-PAYMENT header is required"
        })
        .to_string();
        let challenge = Challenge::parse(&raw).unwrap();
        assert_eq!(challenge.error.as_deref(), Some("X-PAYMENT header is required"));
    }
}
