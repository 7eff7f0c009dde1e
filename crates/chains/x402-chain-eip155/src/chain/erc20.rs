//! Read-only ERC-20 access.

use alloy_primitives::{Address, U256};
use alloy_sol_types::sol;
use async_trait::async_trait;

sol!(
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address owner) external view returns (uint256);
    }
);

/// Failure of a single read-only contract call.
#[derive(Debug, thiserror::Error)]
#[error("{call} on {token} failed: {reason}")]
pub struct Erc20ReadError {
    pub call: &'static str,
    pub token: Address,
    pub reason: String,
}

impl Erc20ReadError {
    pub fn new(call: &'static str, token: Address, reason: impl ToString) -> Self {
        Self {
            call,
            token,
            reason: reason.to_string(),
        }
    }
}

/// The ERC-20 views the buyer reads on the payment token.
///
/// Every call is independent: a token without `symbol()` still reports `decimals()`.
#[async_trait]
pub trait Erc20Reader {
    async fn decimals(&self, token: Address) -> Result<u8, Erc20ReadError>;
    async fn symbol(&self, token: Address) -> Result<String, Erc20ReadError>;
    async fn name(&self, token: Address) -> Result<String, Erc20ReadError>;
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, Erc20ReadError>;
}

#[async_trait]
impl<T: Erc20Reader + Send + Sync + ?Sized> Erc20Reader for std::sync::Arc<T> {
    async fn decimals(&self, token: Address) -> Result<u8, Erc20ReadError> {
        (**self).decimals(token).await
    }

    async fn symbol(&self, token: Address) -> Result<String, Erc20ReadError> {
        (**self).symbol(token).await
    }

    async fn name(&self, token: Address) -> Result<String, Erc20ReadError> {
        (**self).name(token).await
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, Erc20ReadError> {
        (**self).balance_of(token, owner).await
    }
}
