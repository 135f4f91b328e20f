//! `contribute`: command-line contribution client.
//!
//! Connects to an EIP-1193 style JSON-RPC wallet endpoint, sends native or
//! token contributions to the fixed recipient and records them with the
//! tracker service.

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use contribute_common::network::{AssetKind, ChainParams, Network, TokenConfig};
use contribute_common::wallet::{TransferClient, WalletSession};
use contribute_wallet::chain::ChainWallet;
use contribute_wallet::ethereum::{parse_address, EthereumWallet};
use contribute_wallet::orchestrator::{Orchestrator, SubmissionState};
use contribute_wallet::provider::http_provider;
use contribute_wallet::tracker_api::TrackerClient;
use ethers::providers::Http;
use rust_decimal::Decimal;
use tracing::info;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Chain {
    /// Sepolia testnet (chain id 11155111).
    Sepolia,
    /// Local development node (chain id 31337).
    Local,
}

#[derive(Parser)]
#[command(name = "contribute", about = "Send and track contributions")]
struct Cli {
    /// JSON-RPC endpoint of the wallet.
    #[arg(long, env = "WALLET_RPC_URL", default_value = "http://localhost:8545")]
    rpc_url: String,

    /// Base URL of the tracker service.
    #[arg(long, env = "TRACKER_URL", default_value = "http://localhost:8000")]
    tracker_url: String,

    /// Address receiving contributions.
    #[arg(
        long,
        env = "RECIPIENT_ADDRESS",
        default_value = "0x1234567890123456789012345678901234567890"
    )]
    recipient: String,

    /// Chain the wallet must be on.
    #[arg(long, value_enum, default_value_t = Chain::Sepolia)]
    chain: Chain,

    /// Network to contribute on.
    #[arg(long, default_value_t = Network::Ethereum)]
    network: Network,

    /// ERC-20 contract for token contributions (defaults to Sepolia LINK on Sepolia).
    #[arg(long, env = "TOKEN_CONTRACT")]
    token_contract: Option<String>,

    /// Receipt polling interval in milliseconds.
    #[arg(long, default_value_t = 2000)]
    poll_ms: u64,

    /// Conversion rate applied to native contributions.
    #[arg(long, env = "CONVERSION_RATE", default_value = "1000")]
    conversion_rate: Decimal,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect and show native and token balances.
    Balance,
    /// Send a contribution and record it.
    Send {
        /// Amount in whole units (e.g. 0.05).
        #[arg(long)]
        amount: String,
        /// Send the configured ERC-20 token instead of the native currency.
        #[arg(long)]
        token: bool,
    },
    /// List contributions for an address (defaults to the connected account).
    History {
        #[arg(long)]
        address: Option<String>,
    },
    /// Show aggregate totals across all contributors.
    Totals,
}

fn build_wallet(cli: &Cli) -> anyhow::Result<ChainWallet<Http>> {
    let wallet = match cli.network {
        Network::Ethereum => {
            let chain = match cli.chain {
                Chain::Sepolia => ChainParams::sepolia(),
                Chain::Local => ChainParams::local_dev(&cli.rpc_url),
            };
            let token = match (&cli.token_contract, cli.chain) {
                (Some(contract), _) => Some(TokenConfig {
                    symbol: "TOKEN".to_string(),
                    contract: contract.clone(),
                    decimals: 18,
                }),
                (None, Chain::Sepolia) => Some(TokenConfig::sepolia_link()),
                (None, Chain::Local) => None,
            };
            let recipient = parse_address(&cli.recipient).context("recipient address")?;
            let mut wallet = EthereumWallet::new(http_provider(&cli.rpc_url)?, chain, recipient)
                .with_confirmation_poll(Duration::from_millis(cli.poll_ms));
            if let Some(token) = token {
                wallet = wallet.with_token(token).context("token contract")?;
            }
            ChainWallet::Ethereum(wallet)
        }
        other => ChainWallet::Unsupported(other),
    };
    Ok(wallet)
}

fn explorer_url(wallet: &ChainWallet<Http>, tx_hash: &str) -> Option<String> {
    match wallet {
        ChainWallet::Ethereum(eth) => eth.chain().explorer_tx_url(tx_hash),
        ChainWallet::Unsupported(_) => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contribute_wallet=info,contribute=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let tracker = TrackerClient::new(cli.tracker_url.clone());

    match &cli.command {
        Command::Totals => {
            let totals = tracker.totals().await.context("fetching totals")?;
            println!(
                "{} {} from {} contributions ({} tokens)",
                totals.total_native,
                cli.network.native_symbol(),
                totals.count,
                totals.total_converted
            );
        }
        Command::History { address: Some(address) } => {
            print_history(&tracker, address).await?;
        }
        Command::History { address: None } => {
            let wallet = build_wallet(&cli)?;
            let account = wallet.connect().await.context("connecting wallet")?;
            print_history(&tracker, &account.address).await?;
        }
        Command::Balance => {
            let wallet = build_wallet(&cli)?;
            let account = wallet.connect().await.context("connecting wallet")?;
            println!("account: {}", account.address);
            println!("balance: {} {}", account.balance, cli.network.native_symbol());
            if let ChainWallet::Ethereum(eth) = &wallet {
                if let Some(token) = eth.token() {
                    let balance = wallet.token_balance(&account.address).await;
                    println!("token:   {balance} {}", token.symbol);
                }
            }
        }
        Command::Send { amount, token } => {
            let wallet = build_wallet(&cli)?;
            let account = wallet.connect().await.context("connecting wallet")?;
            let mut session = WalletSession::new(cli.network, account);
            info!(address = %session.address, backend = wallet.backend_name(), "wallet connected");

            let asset = if *token {
                AssetKind::Token
            } else {
                AssetKind::Native
            };
            let orchestrator =
                Orchestrator::new(wallet, tracker.clone()).with_conversion_rate(cli.conversion_rate);

            let mut states = orchestrator.subscribe();
            let progress = tokio::spawn(async move {
                while states.changed().await.is_ok() {
                    let state = *states.borrow_and_update();
                    match state {
                        SubmissionState::AwaitingWalletConfirmation => {
                            eprintln!("waiting for wallet approval...")
                        }
                        SubmissionState::AwaitingChainConfirmation => {
                            eprintln!("waiting for on-chain confirmation...")
                        }
                        SubmissionState::Persisting => eprintln!("recording contribution..."),
                        _ => {}
                    }
                }
            });

            let result = orchestrator.submit(Some(&mut session), amount, asset).await;
            let wallet = orchestrator.client();
            let receipt = match result {
                Ok(receipt) => receipt,
                Err(e) => {
                    drop(orchestrator);
                    let _ = progress.await;
                    return Err(e).context("contribution failed");
                }
            };

            println!("transaction: {}", receipt.tx_hash);
            if let Some(url) = explorer_url(wallet, &receipt.tx_hash) {
                println!("explorer:    {url}");
            }
            println!(
                "recorded:    {} {} -> {} tokens",
                receipt.record.native_amount,
                cli.network.native_symbol(),
                receipt.record.converted_amount
            );
            println!("balance:     {}", session.balance);

            let totals = tracker.totals().await.context("refreshing totals")?;
            println!(
                "totals:      {} {} / {} tokens across {} contributions",
                totals.total_native,
                cli.network.native_symbol(),
                totals.total_converted,
                totals.count
            );
            drop(orchestrator);
            let _ = progress.await;
        }
    }
    Ok(())
}

async fn print_history(tracker: &TrackerClient, address: &str) -> anyhow::Result<()> {
    let records = tracker
        .my_contributions(address)
        .await
        .context("fetching contribution history")?;
    if records.is_empty() {
        println!("no contributions for {address}");
        return Ok(());
    }
    for record in records {
        println!(
            "{}  {}  {} ({})  {} tokens",
            record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            record.tx_hash,
            record.native_amount,
            record.network,
            record.converted_amount
        );
    }
    Ok(())
}
