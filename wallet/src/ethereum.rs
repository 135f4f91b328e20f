//! Ethereum wallet client.
//!
//! Wraps an ethers [`Provider`] behind [`TransferClient`]: requests accounts,
//! validates (and if necessary switches or registers) the chain, reads
//! balances, submits native or ERC-20 transfers to the fixed recipient and
//! polls for the receipt. Signing and gas filling stay with the wallet, so
//! transactions go out through `eth_sendTransaction` rather than a local
//! signer.

use std::time::Duration;

use contribute_common::network::{AssetKind, ChainParams, Network, TokenConfig};
use contribute_common::wallet::{ConnectedAccount, TransferClient, WalletError, WalletSession};
use ethers::abi::{self, ParamType, Token};
use ethers::providers::{JsonRpcClient, Middleware, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, TxHash, U256, U64};
use ethers::utils::{format_units, id, parse_units};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::provider::{rpc_code, wallet_error, UNRECOGNIZED_CHAIN, USER_REJECTED};

const DEFAULT_CONFIRMATION_POLL: Duration = Duration::from_secs(2);

/// Configured ERC-20 token with its contract address parsed.
struct Erc20 {
    config: TokenConfig,
    contract: Address,
}

pub struct EthereumWallet<P> {
    provider: Provider<P>,
    chain: ChainParams,
    recipient: Address,
    token: Option<Erc20>,
    confirmation_poll: Duration,
}

pub fn parse_address(raw: &str) -> Result<Address, WalletError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|_| WalletError::InvalidAddress(raw.to_string()))
}

/// Whole-unit amount to base units. Amounts finer than `decimals` are
/// refused rather than truncated.
fn to_base_units(amount: Decimal, decimals: u32) -> Result<U256, WalletError> {
    let amount = amount.normalize();
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(format!(
            "{amount} is not a positive amount"
        )));
    }
    if amount.scale() > decimals {
        return Err(WalletError::InvalidAmount(format!(
            "{amount} has more than {decimals} decimal places"
        )));
    }
    let units = parse_units(amount.to_string(), decimals)
        .map_err(|e| WalletError::InvalidAmount(e.to_string()))?;
    Ok(units.into())
}

/// Base units to a whole-unit string without trailing zeros ("1.5", "0").
fn display_units(value: U256, decimals: u32) -> Result<String, WalletError> {
    let formatted =
        format_units(value, decimals).map_err(|e| WalletError::Rpc(e.to_string()))?;
    if !formatted.contains('.') {
        return Ok(formatted);
    }
    Ok(formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string())
}

/// Calldata for an ERC-20 `transfer(recipient, amount)`.
pub fn erc20_transfer_calldata(recipient: Address, amount: U256) -> Bytes {
    let mut data = id("transfer(address,uint256)").to_vec();
    data.extend(abi::encode(&[Token::Address(recipient), Token::Uint(amount)]));
    data.into()
}

fn erc20_balance_of_calldata(owner: Address) -> Bytes {
    let mut data = id("balanceOf(address)").to_vec();
    data.extend(abi::encode(&[Token::Address(owner)]));
    data.into()
}

impl<P: JsonRpcClient> EthereumWallet<P> {
    pub fn new(provider: Provider<P>, chain: ChainParams, recipient: Address) -> Self {
        Self {
            provider,
            chain,
            recipient,
            token: None,
            confirmation_poll: DEFAULT_CONFIRMATION_POLL,
        }
    }

    /// Enable token transfers. Fails if the contract is not an address.
    pub fn with_token(mut self, token: TokenConfig) -> Result<Self, WalletError> {
        let contract = parse_address(&token.contract)?;
        self.token = Some(Erc20 {
            config: token,
            contract,
        });
        Ok(self)
    }

    pub fn with_confirmation_poll(mut self, interval: Duration) -> Self {
        self.confirmation_poll = interval;
        self
    }

    pub fn chain(&self) -> &ChainParams {
        &self.chain
    }

    pub fn token(&self) -> Option<&TokenConfig> {
        self.token.as_ref().map(|t| &t.config)
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        let id = self.provider.get_chainid().await.map_err(wallet_error)?;
        if id > U256::from(u64::MAX) {
            return Err(WalletError::Rpc(format!("chain id {id} out of range")));
        }
        Ok(id.as_u64())
    }

    async fn switch_chain(&self) -> Result<(), ProviderError> {
        self.provider
            .request(
                "wallet_switchEthereumChain",
                [json!({ "chainId": self.chain.chain_id_hex() })],
            )
            .await
    }

    async fn add_chain(&self) -> Result<(), ProviderError> {
        let mut params = json!({
            "chainId": self.chain.chain_id_hex(),
            "chainName": self.chain.chain_name,
            "rpcUrls": self.chain.rpc_urls,
            "nativeCurrency": {
                "name": self.chain.currency_symbol,
                "symbol": self.chain.currency_symbol,
                "decimals": self.chain.currency_decimals,
            },
        });
        if !self.chain.explorer_url.is_empty() {
            params["blockExplorerUrls"] = json!([self.chain.explorer_url]);
        }
        self.provider
            .request("wallet_addEthereumChain", [params])
            .await
    }

    /// Make sure the wallet is on the configured chain, switching (and
    /// registering the chain first if the wallet does not know it).
    async fn ensure_chain(&self) -> Result<(), WalletError> {
        let expected = self.chain.chain_id;
        let current = self.chain_id().await?;
        if current == expected {
            return Ok(());
        }
        info!(current, expected, "wallet on wrong chain, requesting switch");

        let mismatch = |reason: String| WalletError::ChainMismatch { expected, reason };
        match self.switch_chain().await {
            Ok(()) => {}
            Err(e) if rpc_code(&e) == Some(UNRECOGNIZED_CHAIN) => {
                info!(chain = %self.chain.chain_name, "chain unknown to wallet, registering it");
                self.add_chain().await.map_err(|e| match rpc_code(&e) {
                    Some(USER_REJECTED) => WalletError::UserRejected,
                    _ => mismatch(format!("failed to add chain: {e}")),
                })?;
                self.switch_chain().await.map_err(|e| match rpc_code(&e) {
                    Some(USER_REJECTED) => WalletError::UserRejected,
                    _ => mismatch(format!("switch after add failed: {e}")),
                })?;
            }
            Err(e) if rpc_code(&e) == Some(USER_REJECTED) => return Err(WalletError::UserRejected),
            Err(e) => return Err(mismatch(format!("switch failed: {e}"))),
        }

        let now = self.chain_id().await?;
        if now != expected {
            return Err(mismatch(format!("wallet still reports chain {now}")));
        }
        Ok(())
    }

    async fn read_token_balance(&self, token: &Erc20, owner: Address) -> Result<U256, WalletError> {
        let call: TypedTransaction = TransactionRequest::new()
            .to(token.contract)
            .data(erc20_balance_of_calldata(owner))
            .into();
        let raw = self
            .provider
            .call(&call, None)
            .await
            .map_err(wallet_error)?;
        abi::decode(&[ParamType::Uint(256)], &raw)
            .ok()
            .and_then(|tokens| tokens.into_iter().next())
            .and_then(Token::into_uint)
            .ok_or_else(|| WalletError::Rpc(format!("balanceOf returned {raw}")))
    }
}

impl<P: JsonRpcClient> TransferClient for EthereumWallet<P> {
    async fn connect(&self) -> Result<ConnectedAccount, WalletError> {
        let accounts: Vec<Address> = self
            .provider
            .request("eth_requestAccounts", ())
            .await
            .map_err(wallet_error)?;
        let address = accounts.first().copied().ok_or_else(|| {
            WalletError::ProviderUnavailable("wallet exposed no accounts".to_string())
        })?;

        self.ensure_chain().await?;

        let address = format!("{address:?}");
        let balance = self.balance(&address).await;
        info!(%address, %balance, chain = %self.chain.chain_name, "wallet connected");
        Ok(ConnectedAccount { address, balance })
    }

    async fn balance(&self, address: &str) -> String {
        let owner = match parse_address(address) {
            Ok(owner) => owner,
            Err(e) => {
                warn!("balance read skipped: {e}");
                return "0".to_string();
            }
        };
        let result = match self.provider.get_balance(owner, None).await {
            Ok(wei) => display_units(wei, self.chain.currency_decimals),
            Err(e) => Err(wallet_error(e)),
        };
        result.unwrap_or_else(|e| {
            warn!(%address, "balance read failed: {e}");
            "0".to_string()
        })
    }

    async fn token_balance(&self, address: &str) -> String {
        let Some(token) = self.token.as_ref() else {
            return "0".to_string();
        };
        let result = match parse_address(address) {
            Ok(owner) => self
                .read_token_balance(token, owner)
                .await
                .and_then(|units| display_units(units, token.config.decimals)),
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!(%address, token = %token.config.symbol, "token balance read failed: {e}");
            "0".to_string()
        })
    }

    async fn submit_transfer(
        &self,
        session: &WalletSession,
        amount: Decimal,
        asset: AssetKind,
    ) -> Result<String, WalletError> {
        if session.network != Network::Ethereum {
            return Err(WalletError::ChainMismatch {
                expected: self.chain.chain_id,
                reason: format!("session is connected to {}", session.network),
            });
        }
        let from = parse_address(&session.address)?;

        let tx = match asset {
            AssetKind::Native => {
                // Best effort: the balance may move between this check and inclusion.
                let available = session.balance_decimal();
                if amount > available {
                    return Err(WalletError::InsufficientBalance {
                        available,
                        requested: amount,
                    });
                }
                let value = to_base_units(amount, self.chain.currency_decimals)?;
                TransactionRequest::new()
                    .from(from)
                    .to(self.recipient)
                    .value(value)
            }
            AssetKind::Token => {
                let token = self.token.as_ref().ok_or_else(|| {
                    WalletError::UnsupportedAsset("no token contract configured".to_string())
                })?;
                let units = to_base_units(amount, token.config.decimals)?;
                let held = self.read_token_balance(token, from).await?;
                if units > held {
                    let available = display_units(held, token.config.decimals)
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(Decimal::ZERO);
                    return Err(WalletError::InsufficientBalance {
                        available,
                        requested: amount,
                    });
                }
                TransactionRequest::new()
                    .from(from)
                    .to(token.contract)
                    .data(erc20_transfer_calldata(self.recipient, units))
            }
        };

        let hash: TxHash = self
            .provider
            .request("eth_sendTransaction", [tx])
            .await
            .map_err(wallet_error)?;
        let tx_hash = format!("{hash:?}");
        info!(%tx_hash, %amount, ?asset, "transfer submitted");
        Ok(tx_hash)
    }

    /// Poll until a receipt appears. Failed polls are retried; only a
    /// receipt without success status ends the wait with an error.
    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<(), WalletError> {
        let hash: TxHash = tx_hash
            .trim()
            .parse()
            .map_err(|_| WalletError::Rpc(format!("invalid transaction hash '{tx_hash}'")))?;
        loop {
            match self.provider.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    return if receipt.status == Some(U64::one()) {
                        info!(%tx_hash, block = ?receipt.block_number, "transfer confirmed");
                        Ok(())
                    } else {
                        warn!(%tx_hash, status = ?receipt.status, "transfer reverted");
                        Err(WalletError::TransactionFailed(tx_hash.to_string()))
                    };
                }
                Ok(None) => debug!(%tx_hash, "receipt not available yet"),
                Err(e) => warn!(%tx_hash, "receipt poll failed, retrying: {e}"),
            }
            tokio::time::sleep(self.confirmation_poll).await;
        }
    }

    fn network(&self) -> Network {
        self.chain.network
    }

    fn backend_name(&self) -> &str {
        "ethereum-jsonrpc"
    }
}
