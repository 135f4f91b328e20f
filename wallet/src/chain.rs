//! Per-network wallet selection.
//!
//! Only Ethereum has a client. Other networks in the closed [`Network`] set
//! map to [`ChainWallet::Unsupported`], which fails every wallet operation
//! with `ProviderUnavailable` rather than pretending to succeed.

use contribute_common::network::{AssetKind, Network};
use contribute_common::wallet::{ConnectedAccount, TransferClient, WalletError, WalletSession};
use ethers::providers::JsonRpcClient;
use rust_decimal::Decimal;

use crate::ethereum::EthereumWallet;

pub enum ChainWallet<P> {
    Ethereum(EthereumWallet<P>),
    Unsupported(Network),
}

impl<P> ChainWallet<P> {
    fn unsupported(network: Network) -> WalletError {
        WalletError::ProviderUnavailable(format!("{network} wallets are not supported yet"))
    }
}

impl<P: JsonRpcClient> TransferClient for ChainWallet<P> {
    async fn connect(&self) -> Result<ConnectedAccount, WalletError> {
        match self {
            ChainWallet::Ethereum(wallet) => wallet.connect().await,
            ChainWallet::Unsupported(network) => Err(Self::unsupported(*network)),
        }
    }

    async fn balance(&self, address: &str) -> String {
        match self {
            ChainWallet::Ethereum(wallet) => wallet.balance(address).await,
            ChainWallet::Unsupported(_) => "0".to_string(),
        }
    }

    async fn token_balance(&self, address: &str) -> String {
        match self {
            ChainWallet::Ethereum(wallet) => wallet.token_balance(address).await,
            ChainWallet::Unsupported(_) => "0".to_string(),
        }
    }

    async fn submit_transfer(
        &self,
        session: &WalletSession,
        amount: Decimal,
        asset: AssetKind,
    ) -> Result<String, WalletError> {
        match self {
            ChainWallet::Ethereum(wallet) => wallet.submit_transfer(session, amount, asset).await,
            ChainWallet::Unsupported(network) => Err(Self::unsupported(*network)),
        }
    }

    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<(), WalletError> {
        match self {
            ChainWallet::Ethereum(wallet) => wallet.wait_for_confirmation(tx_hash).await,
            ChainWallet::Unsupported(network) => Err(Self::unsupported(*network)),
        }
    }

    fn network(&self) -> Network {
        match self {
            ChainWallet::Ethereum(wallet) => wallet.network(),
            ChainWallet::Unsupported(network) => *network,
        }
    }

    fn backend_name(&self) -> &str {
        match self {
            ChainWallet::Ethereum(wallet) => wallet.backend_name(),
            ChainWallet::Unsupported(_) => "unsupported",
        }
    }
}
