//! Signing identities.
//!
//! A buyer pays from exactly one EVM address. [`SignerIdentity`] enumerates the
//! shapes a configured signer can take and [`SignerIdentity::resolve`] turns any of
//! them into that address plus something that can sign an EIP-712 hash.

use alloy_primitives::{Address, B256, Signature};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::chain::EvmPrivateKey;

/// A trait that abstracts signing operations, allowing both owned signers and Arc-wrapped signers.
///
/// Alloy's `Signer` trait is not implemented for `Arc<T>`, and remote signers
/// are shared behind a trait object.
#[async_trait]
pub trait SignerLike {
    /// Returns the address of the signer.
    fn address(&self) -> Address;

    /// Signs the given hash.
    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error>;
}

#[async_trait]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

#[async_trait]
impl<T: SignerLike + Send + Sync + ?Sized> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

/// A shareable signer of any kind.
pub type DynSigner = Arc<dyn SignerLike + Send + Sync>;

/// The configured signer, by shape.
///
/// Resolution order is fixed per variant: a wallet pays from its first account,
/// an account or a remote signer from its own address.
#[derive(Clone)]
pub enum SignerIdentity {
    /// Several local accounts; the first one pays.
    Wallet(Vec<PrivateKeySigner>),
    /// A single local account.
    Account(PrivateKeySigner),
    /// A signer held elsewhere that reports its own address.
    Remote(DynSigner),
    /// A signer for a non-EVM chain. It cannot sign ERC-3009 authorizations.
    Unsupported { kind: String },
}

/// The address a run pays from and the signer that authorizes the payments.
#[derive(Clone)]
pub struct ResolvedSigner {
    pub address: Address,
    pub signer: DynSigner,
}

impl fmt::Debug for ResolvedSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Only EVM signers are supported, got a {0} signer")]
    NotEvm(String),
    #[error("Unable to determine wallet address from signer")]
    NoAddress,
    #[error("Invalid private key: {0}")]
    InvalidKey(String),
}

impl SignerIdentity {
    /// One key makes an account, several make a wallet.
    pub fn from_private_keys(keys: &[EvmPrivateKey]) -> Result<Self, SignerError> {
        let mut signers = keys
            .iter()
            .map(|key| {
                key.to_signer()
                    .map_err(|e| SignerError::InvalidKey(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        match signers.len() {
            0 => Err(SignerError::NoAddress),
            1 => Ok(SignerIdentity::Account(signers.remove(0))),
            _ => Ok(SignerIdentity::Wallet(signers)),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            SignerIdentity::Wallet(_) => "wallet",
            SignerIdentity::Account(_) => "account",
            SignerIdentity::Remote(_) => "remote",
            SignerIdentity::Unsupported { kind } => kind,
        }
    }

    pub fn resolve(&self) -> Result<ResolvedSigner, SignerError> {
        match self {
            SignerIdentity::Wallet(signers) => {
                let first = signers.first().ok_or(SignerError::NoAddress)?;
                Ok(ResolvedSigner {
                    address: first.address(),
                    signer: Arc::new(first.clone()),
                })
            }
            SignerIdentity::Account(signer) => Ok(ResolvedSigner {
                address: signer.address(),
                signer: Arc::new(signer.clone()),
            }),
            SignerIdentity::Remote(signer) => {
                let address = signer.address();
                if address == Address::ZERO {
                    return Err(SignerError::NoAddress);
                }
                Ok(ResolvedSigner {
                    address,
                    signer: Arc::clone(signer),
                })
            }
            SignerIdentity::Unsupported { kind } => Err(SignerError::NotEvm(kind.clone())),
        }
    }
}

impl fmt::Debug for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerIdentity::Wallet(signers) => f
                .debug_tuple("Wallet")
                .field(&signers.iter().map(|s| s.address()).collect::<Vec<_>>())
                .finish(),
            SignerIdentity::Account(signer) => {
                f.debug_tuple("Account").field(&signer.address()).finish()
            }
            SignerIdentity::Remote(signer) => {
                f.debug_tuple("Remote").field(&signer.address()).finish()
            }
            SignerIdentity::Unsupported { kind } => f
                .debug_struct("Unsupported")
                .field("kind", kind)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Detached;

    #[async_trait]
    impl SignerLike for Detached {
        fn address(&self) -> Address {
            Address::ZERO
        }

        async fn sign_hash(&self, _hash: &B256) -> Result<Signature, alloy_signer::Error> {
            Err(alloy_signer::Error::other("detached"))
        }
    }

    #[test]
    fn test_wallet_resolves_to_first_account() {
        let first = PrivateKeySigner::random();
        let second = PrivateKeySigner::random();
        let identity = SignerIdentity::Wallet(vec![first.clone(), second]);
        let resolved = identity.resolve().unwrap();
        assert_eq!(resolved.address, first.address());
        assert_eq!(resolved.signer.address(), first.address());
    }

    #[test]
    fn test_empty_wallet_has_no_address() {
        let identity = SignerIdentity::Wallet(vec![]);
        assert!(matches!(identity.resolve(), Err(SignerError::NoAddress)));
    }

    #[test]
    fn test_remote_signer() {
        let local = PrivateKeySigner::random();
        let address = local.address();
        let identity = SignerIdentity::Remote(Arc::new(local));
        assert_eq!(identity.resolve().unwrap().address, address);

        let identity = SignerIdentity::Remote(Arc::new(Detached));
        assert!(matches!(identity.resolve(), Err(SignerError::NoAddress)));
    }

    #[test]
    fn test_non_evm_signer_is_rejected() {
        let identity = SignerIdentity::Unsupported {
            kind: "solana".into(),
        };
        let err = identity.resolve().unwrap_err();
        assert_eq!(err.to_string(), "Only EVM signers are supported, got a solana signer");
    }

    #[test]
    fn test_from_private_keys() {
        let key: EvmPrivateKey =
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
                .parse()
                .unwrap();
        let identity = SignerIdentity::from_private_keys(&[key]).unwrap();
        assert_eq!(identity.kind(), "account");
        let identity = SignerIdentity::from_private_keys(&[key, key]).unwrap();
        assert_eq!(identity.kind(), "wallet");
        assert!(SignerIdentity::from_private_keys(&[]).is_err());
    }
}
