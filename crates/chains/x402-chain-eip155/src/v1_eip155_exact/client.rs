//! Client-side payment signing for the V1 EIP-155 "exact" scheme.
//!
//! # Usage
//!
//! ```ignore
//! use x402_chain_eip155::v1_eip155_exact::V1Eip155ExactClient;
//! use alloy_signer_local::PrivateKeySigner;
//!
//! let client = V1Eip155ExactClient::new(PrivateKeySigner::random());
//! let authorization = client.authorize(1, &requirements).await?;
//! // send `authorization.header` as `X-PAYMENT`
//! ```

use alloy_primitives::{Address, FixedBytes, U256};
use alloy_sol_types::{SolStruct, eip712_domain};
use rand::{Rng, rng};
use std::time::SystemTimeError;
use x402_types::proto::v1::PaymentRequirements;
use x402_types::timestamp::UnixTimestamp;

use crate::chain::{Eip155ChainReference, parse_asset_address};
use crate::signer::SignerLike;
use crate::v1_eip155_exact::{
    ExactEvmPayload, ExactEvmPayloadAuthorization, ExactScheme, PaymentPayload,
    TransferWithAuthorization,
};

/// How far `validAfter` is backdated from now.
pub const VALID_AFTER_SKEW_SECS: u64 = 10 * 60;

/// EIP-712 signing parameters for an ERC-3009 authorization.
#[derive(Debug, Clone)]
pub struct Eip3009SigningParams {
    /// The EIP-155 chain ID (numeric)
    pub chain_id: u64,
    /// The token contract address (verifying contract for EIP-712)
    pub asset_address: Address,
    /// The recipient address for the transfer
    pub pay_to: Address,
    /// The amount to transfer
    pub amount: U256,
    /// Maximum timeout in seconds for the authorization validity window
    pub max_timeout_seconds: u64,
    /// EIP-712 domain name of the token; empty when the server sent none
    pub name: String,
    /// EIP-712 domain version of the token; empty when the server sent none
    pub version: String,
}

impl Eip3009SigningParams {
    pub fn from_requirements(requirements: &PaymentRequirements) -> Result<Self, AuthorizeError> {
        let chain = Eip155ChainReference::from_network_name(&requirements.network)
            .map_err(|_| AuthorizeError::UnsupportedNetwork(requirements.network.clone()))?;
        let asset_address = parse_asset_address(&requirements.asset).ok_or_else(|| {
            AuthorizeError::InvalidAddress {
                field: "asset",
                value: requirements.asset.clone(),
            }
        })?;
        let pay_to = parse_asset_address(&requirements.pay_to).ok_or_else(|| {
            AuthorizeError::InvalidAddress {
                field: "payTo",
                value: requirements.pay_to.clone(),
            }
        })?;
        let extra = requirements.extra();
        Ok(Self {
            chain_id: chain.inner(),
            asset_address,
            pay_to,
            amount: requirements.max_amount_required,
            max_timeout_seconds: requirements.max_timeout_seconds,
            name: extra
                .and_then(|e| e.eip712_name())
                .unwrap_or_default()
                .to_string(),
            version: extra
                .and_then(|e| e.eip712_version())
                .unwrap_or_default()
                .to_string(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    #[error("Network {0} is not an EVM network this client can pay on")]
    UnsupportedNetwork(String),
    #[error("Invalid {field} address {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("System clock is set before the Unix epoch: {0}")]
    Clock(#[from] SystemTimeError),
    #[error("Signing failed: {0}")]
    Signing(#[from] alloy_signer::Error),
    #[error("Unable to encode payment payload: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Signs an ERC-3009 TransferWithAuthorization using EIP-712.
///
/// The authorization is valid from [`VALID_AFTER_SKEW_SECS`] ago until
/// `max_timeout_seconds` from now, and carries a fresh random 32-byte nonce.
pub async fn sign_erc3009_authorization<S: SignerLike + Sync + ?Sized>(
    signer: &S,
    params: &Eip3009SigningParams,
) -> Result<ExactEvmPayload, AuthorizeError> {
    let domain = eip712_domain! {
        name: params.name.clone(),
        version: params.version.clone(),
        chain_id: params.chain_id,
        verifying_contract: params.asset_address,
    };

    let now = UnixTimestamp::try_now()?;
    let valid_after = now.saturating_sub(VALID_AFTER_SKEW_SECS);
    let valid_before = now + params.max_timeout_seconds;
    let nonce: [u8; 32] = rng().random();

    let authorization = ExactEvmPayloadAuthorization {
        from: signer.address(),
        to: params.pay_to,
        value: params.amount,
        valid_after,
        valid_before,
        nonce: FixedBytes(nonce),
    };

    // The server rebuilds this struct from `authorization` to verify the signature.
    let eip712_hash = TransferWithAuthorization::from(&authorization).eip712_signing_hash(&domain);
    let signature = signer.sign_hash(&eip712_hash).await?;

    Ok(ExactEvmPayload {
        signature: signature.as_bytes().into(),
        authorization,
    })
}

/// A signed payment, ready to attach to the retried request.
#[derive(Debug, Clone)]
pub struct PaymentAuthorization {
    /// Base64 JSON value of the `X-PAYMENT` header.
    pub header: String,
    pub payload: PaymentPayload,
}

/// Signs V1 EIP-155 exact scheme payments.
///
/// # Type Parameters
///
/// - `S`: The signer type, which must implement [`SignerLike`]
#[derive(Debug)]
pub struct V1Eip155ExactClient<S> {
    signer: S,
}

impl<S> V1Eip155ExactClient<S>
where
    S: SignerLike + Send + Sync,
{
    /// Creates a new V1 EIP-155 exact scheme client with the given signer.
    pub fn new(signer: S) -> Self {
        Self { signer }
    }

    /// Builds a single-use authorization for `requirements`.
    ///
    /// `x402_version` is copied from the challenge into the payload.
    #[tracing::instrument(skip_all, fields(network = %requirements.network, pay_to = %requirements.pay_to))]
    pub async fn authorize(
        &self,
        x402_version: u32,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentAuthorization, AuthorizeError> {
        let params = Eip3009SigningParams::from_requirements(requirements)?;
        let evm_payload = sign_erc3009_authorization(&self.signer, &params).await?;
        let payload = PaymentPayload {
            x402_version,
            scheme: ExactScheme,
            network: requirements.network.clone(),
            payload: evm_payload,
        };
        let header = payload.to_header()?;
        Ok(PaymentAuthorization { header, payload })
    }
}
