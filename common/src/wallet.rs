use rust_decimal::Decimal;
use thiserror::Error;

use crate::network::{AssetKind, Network};

/// Errors from wallet operations.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum WalletError {
    /// No wallet extension / RPC endpoint to talk to, or the chain has no
    /// client implementation.
    #[error("wallet provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// The user declined the request in the wallet UI.
    #[error("request rejected in wallet")]
    UserRejected,
    #[error("wallet is not on chain {expected}: {reason}")]
    ChainMismatch { expected: u64, reason: String },
    #[error("insufficient balance: have {available}, need {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },
    /// The receipt reported a non-success status.
    #[error("transaction {0} failed on chain")]
    TransactionFailed(String),
    #[error("asset not supported: {0}")]
    UnsupportedAsset(String),
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
    /// The amount cannot be expressed in the asset's base units.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("wallet rpc error: {0}")]
    Rpc(String),
}

/// Account returned by a successful connect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectedAccount {
    pub address: String,
    /// Native balance as a decimal string in whole units (e.g. "1.25").
    pub balance: String,
}

/// The currently connected account. Process-local, never persisted.
///
/// Passed explicitly to whatever needs it; there is no global session.
/// `balance` is the last fetched value and may be stale until refreshed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletSession {
    pub network: Network,
    pub address: String,
    pub balance: String,
}

impl WalletSession {
    pub fn new(network: Network, account: ConnectedAccount) -> Self {
        Self {
            network,
            address: account.address,
            balance: account.balance,
        }
    }

    /// Last fetched balance; an unparseable display string counts as zero.
    pub fn balance_decimal(&self) -> Decimal {
        self.balance.parse().unwrap_or(Decimal::ZERO)
    }
}

/// Abstraction over chain wallets.
///
/// Signing, broadcasting and inclusion are delegated to the wallet and the
/// chain; implementations only sequence the provider calls.
#[allow(async_fn_in_trait)]
pub trait TransferClient {
    /// Request account access, making sure the wallet is on the required chain.
    async fn connect(&self) -> Result<ConnectedAccount, WalletError>;

    /// Current native balance as a decimal string. `"0"` on any read failure.
    async fn balance(&self, address: &str) -> String;

    /// Balance of the configured fungible token. `"0"` on any read failure.
    async fn token_balance(&self, address: &str) -> String;

    /// Check funds against the session's last known balance, then hand the
    /// transfer to the wallet. Returns the transaction hash once submitted.
    async fn submit_transfer(
        &self,
        session: &WalletSession,
        amount: Decimal,
        asset: AssetKind,
    ) -> Result<String, WalletError>;

    /// Block until the transaction has one confirmation with success status.
    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<(), WalletError>;

    /// Submit and wait for one confirmation.
    async fn transfer(
        &self,
        session: &WalletSession,
        amount: Decimal,
        asset: AssetKind,
    ) -> Result<String, WalletError> {
        let tx_hash = self.submit_transfer(session, amount, asset).await?;
        self.wait_for_confirmation(&tx_hash).await?;
        Ok(tx_hash)
    }

    fn network(&self) -> Network;

    /// Human-readable backend name (e.g. "ethereum-jsonrpc").
    fn backend_name(&self) -> &str;
}
