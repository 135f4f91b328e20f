//! Contribution tracker daemon.
//!
//! Serves the contribution write path and the history/totals read paths.
//! With `--database-url` records go to PostgreSQL; without it they live in
//! process memory and vanish on restart.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use contribute_common::contribution::CONVERSION_RATE;
use contribute_tracker::store::{ContributionStore, MemoryContributionStore, PgContributionStore};
use contribute_tracker::{router, AppState};
use rust_decimal::Decimal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "contribute-tracker", about = "Crowdfunding contribution tracker")]
struct Cli {
    /// HTTP port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Address to bind.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    bind: String,

    /// PostgreSQL connection string. Omit to use the in-memory store.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Comma-separated list of allowed CORS origins. Any origin when empty.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Reward units credited per native unit when a write omits `tokenAmount`.
    #[arg(long, env = "CONVERSION_RATE", default_value_t = Decimal::from(CONVERSION_RATE))]
    conversion_rate: Decimal,
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    let origins: Vec<HeaderValue> = origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin '{o}'")))
        .collect::<anyhow::Result<_>>()?;
    if origins.is_empty() {
        Ok(layer.allow_origin(Any))
    } else {
        Ok(layer.allow_origin(AllowOrigin::list(origins)))
    }
}

async fn serve<S: ContributionStore>(cli: &Cli, store: S) -> anyhow::Result<()> {
    info!(store = store.backend_name(), rate = %cli.conversion_rate, "starting tracker");
    let state = Arc::new(AppState::new(store, cli.conversion_rate));
    let app = router(state, cors_layer(&cli.cors_origins)?);

    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("tracker listening on {addr}");
    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.database_url.as_deref() {
        Some(url) => {
            let store = PgContributionStore::connect(url)
                .await
                .context("failed to connect to PostgreSQL")?;
            serve(&cli, store).await
        }
        None => {
            warn!("no DATABASE_URL configured, contributions are kept in memory only");
            serve(&cli, MemoryContributionStore::new()).await
        }
    }
}
