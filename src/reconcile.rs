//! Settlement reconciliation: the paid retry and what it cost.

use alloy_primitives::{Address, I256};
use reqwest::header::HeaderValue;
use x402_chain_eip155::chain::{BalanceSnapshot, Erc20Reader, ResolvedAsset, TokenMetadataResolver};
use x402_types::proto::v1::SettleResponse;

use crate::probe::{Exchange, ResourceClient};

/// Outcome of the paid retry.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub exchange: Exchange,
    /// Decoded `X-PAYMENT-RESPONSE`, absent when missing or undecodable.
    pub confirmation: Option<SettleResponse>,
    pub balance_after: Option<BalanceSnapshot>,
    /// `before - after`: positive when funds left the wallet.
    pub delta: Option<I256>,
}

/// Decodes an `X-PAYMENT-RESPONSE` header value.
pub fn decode_confirmation(header: &str) -> Option<SettleResponse> {
    match SettleResponse::from_header(header) {
        Ok(confirmation) => Some(confirmation),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode X-PAYMENT-RESPONSE header");
            None
        }
    }
}

/// Signed balance change between two snapshots, `None` if it does not fit.
pub fn balance_delta(before: &BalanceSnapshot, after: &BalanceSnapshot) -> Option<I256> {
    let before = I256::try_from(before.raw).ok()?;
    let after = I256::try_from(after.raw).ok()?;
    before.checked_sub(after)
}

/// Replays the request with `payment` attached and measures the settlement.
///
/// The balance after payment is only read for contract assets, and the delta only
/// exists when both snapshots do.
pub async fn reconcile<R>(
    http: &ResourceClient,
    resolver: &TokenMetadataResolver<R>,
    payment: HeaderValue,
    asset: &ResolvedAsset,
    owner: Address,
    balance_before: Option<&BalanceSnapshot>,
) -> Result<Settlement, reqwest::Error>
where
    R: Erc20Reader + Send + Sync,
{
    let exchange = http.send(Some(payment)).await?;
    let confirmation = exchange
        .payment_response
        .as_deref()
        .and_then(decode_confirmation);
    if let Some(confirmation) = &confirmation {
        tracing::info!(
            success = confirmation.success,
            transaction = %confirmation.transaction,
            network = %confirmation.network,
            "Payment settled"
        );
    }

    let balance_after = match asset.address {
        Some(token) => {
            resolver
                .balance(token, owner, asset.decimals, asset.symbol.clone())
                .await
        }
        None => None,
    };
    let delta = match (balance_before, &balance_after) {
        (Some(before), Some(after)) => balance_delta(before, after),
        _ => None,
    };

    Ok(Settlement {
        exchange,
        confirmation,
        balance_after,
        delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn snapshot(raw: u64) -> BalanceSnapshot {
        BalanceSnapshot::new(U256::from(raw), 6, Some("USDC".into()))
    }

    #[test]
    fn test_balance_delta_is_before_minus_after() {
        assert_eq!(balance_delta(&snapshot(100), &snapshot(40)), Some(I256::try_from(60i64).unwrap()));
        assert_eq!(balance_delta(&snapshot(40), &snapshot(100)), Some(I256::try_from(-60i64).unwrap()));
        assert_eq!(balance_delta(&snapshot(7), &snapshot(7)), Some(I256::ZERO));
    }

    #[test]
    fn test_balance_delta_out_of_range() {
        let huge = BalanceSnapshot::new(U256::MAX, 6, None);
        assert_eq!(balance_delta(&huge, &snapshot(1)), None);
    }

    #[test]
    fn test_decode_confirmation() {
        let settled = SettleResponse {
            success: true,
            transaction: "0xabc".into(),
            network: "base-sepolia".into(),
            payer: None,
            error_reason: None,
        };
        let header = settled.to_header().unwrap();
        assert_eq!(decode_confirmation(&header), Some(settled));
        assert_eq!(decode_confirmation("%%%"), None);
        assert_eq!(decode_confirmation("bm90IGpzb24="), None);
    }
}
