//! Wallet provider plumbing.
//!
//! A wallet is an ethers [`Provider`] over any [`JsonRpcClient`]
//! (`ethers::providers::Http` for a wallet endpoint or a development node
//! with unlocked accounts). EIP-1193 error codes are lifted into
//! [`WalletError`] here.
//!
//! [`JsonRpcClient`]: ethers::providers::JsonRpcClient

use contribute_common::wallet::WalletError;
use ethers::providers::{Http, Provider, ProviderError, RpcError};

/// EIP-1193: the user rejected the request.
pub const USER_REJECTED: i64 = 4001;
/// EIP-3326: the wallet does not know the requested chain.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

/// JSON-RPC error code carried by a provider error, if the wallet answered
/// with an error object.
pub fn rpc_code(err: &ProviderError) -> Option<i64> {
    err.as_error_response().map(|resp| resp.code)
}

pub fn wallet_error(err: ProviderError) -> WalletError {
    match err.as_error_response() {
        Some(resp) if resp.code == USER_REJECTED => WalletError::UserRejected,
        Some(resp) => WalletError::Rpc(format!("{} (code {})", resp.message, resp.code)),
        None if err.is_serde_error() => WalletError::Rpc(err.to_string()),
        None => WalletError::ProviderUnavailable(err.to_string()),
    }
}

pub fn http_provider(url: &str) -> Result<Provider<Http>, WalletError> {
    Provider::<Http>::try_from(url)
        .map_err(|e| WalletError::ProviderUnavailable(format!("invalid wallet url '{url}': {e}")))
}
