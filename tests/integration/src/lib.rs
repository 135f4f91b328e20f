//! Test harness for the contribution services.
//!
//! [`spawn_tracker`] runs the tracker router on an ephemeral port and
//! [`DevChain`] serves a small JSON-RPC wallet over HTTP, so the wallet
//! client, orchestrator and tracker can be exercised together in-process.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use contribute_tracker::store::ContributionStore;
use contribute_tracker::{router, AppState};
use ethers::types::TransactionReceipt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

pub const ALICE: &str = "0xA11ce00000000000000000000000000000000001";
pub const RECIPIENT: &str = "0x1234567890123456789012345678901234567890";

/// A tracker bound to `127.0.0.1:<ephemeral>`.
pub struct TestTracker {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestTracker {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestTracker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_tracker<S: ContributionStore>(store: S) -> TestTracker {
    let state = Arc::new(AppState::new(store, Decimal::from(1000)));
    let app = router(state, CorsLayer::permissive());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestTracker { addr, handle }
}

/// Mutable state of the simulated wallet.
#[derive(Debug)]
pub struct DevChainState {
    pub chain_id: u64,
    /// Chains the wallet can switch to without `wallet_addEthereumChain`.
    pub known_chains: Vec<u64>,
    pub balance_wei: u128,
    pub token_balance: u128,
    /// Reject the next `eth_sendTransaction` with code 4001.
    pub reject_next_send: bool,
    /// Polls that return a null receipt before the receipt appears.
    pub pending_polls: u32,
    /// Receipt status reported for mined transactions (1 success, 0 revert).
    pub receipt_status: u64,
    pub sent: Vec<Value>,
}

impl Default for DevChainState {
    fn default() -> Self {
        Self {
            chain_id: 31_337,
            known_chains: vec![31_337],
            balance_wei: 1_000_000_000_000_000_000,
            token_balance: 0,
            reject_next_send: false,
            pending_polls: 1,
            receipt_status: 1,
            sent: Vec::new(),
        }
    }
}

fn hex_u64(raw: &str) -> Option<u64> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

fn hex_u128(raw: &str) -> Option<u128> {
    u128::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

/// In-memory EIP-1193 wallet with one unlocked account ([`ALICE`]).
#[derive(Clone, Default)]
pub struct DevChain {
    state: Arc<Mutex<DevChainState>>,
}

impl DevChain {
    pub fn new(state: DevChainState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut DevChainState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value, (i64, String)> {
        let mut state = self.state.lock().unwrap();
        match method {
            "eth_requestAccounts" | "eth_accounts" => Ok(json!([ALICE])),
            "eth_chainId" => Ok(json!(format!("{:#x}", state.chain_id))),
            "wallet_switchEthereumChain" => {
                let requested = params[0]["chainId"]
                    .as_str()
                    .and_then(hex_u64)
                    .ok_or((-32602, "bad chainId".to_string()))?;
                if !state.known_chains.contains(&requested) {
                    return Err((4902, "Unrecognized chain ID".to_string()));
                }
                state.chain_id = requested;
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let requested = params[0]["chainId"]
                    .as_str()
                    .and_then(hex_u64)
                    .ok_or((-32602, "bad chainId".to_string()))?;
                state.known_chains.push(requested);
                Ok(Value::Null)
            }
            "eth_getBalance" => Ok(json!(format!("{:#x}", state.balance_wei))),
            "eth_call" => Ok(json!(format!("0x{:064x}", state.token_balance))),
            "eth_sendTransaction" => {
                if state.reject_next_send {
                    state.reject_next_send = false;
                    return Err((4001, "User rejected the request.".to_string()));
                }
                let tx = params[0].clone();
                if let Some(value) = tx["value"].as_str().and_then(hex_u128) {
                    state.balance_wei = state.balance_wei.saturating_sub(value);
                }
                state.sent.push(tx);
                Ok(json!(format!("0x{:064x}", state.sent.len())))
            }
            "eth_getTransactionReceipt" => {
                if state.pending_polls > 0 {
                    state.pending_polls -= 1;
                    return Ok(Value::Null);
                }
                let transaction_hash = params[0]
                    .as_str()
                    .and_then(|raw| raw.parse().ok())
                    .ok_or((-32602, "bad transaction hash".to_string()))?;
                let receipt = TransactionReceipt {
                    transaction_hash,
                    status: Some(state.receipt_status.into()),
                    block_number: Some(1u64.into()),
                    ..Default::default()
                };
                serde_json::to_value(receipt).map_err(|e| (-32603, e.to_string()))
            }
            other => Err((-32601, format!("method {other} not found"))),
        }
    }

    /// Serve the wallet as a JSON-RPC 2.0 endpoint; returns its URL.
    pub async fn serve(&self) -> (String, JoinHandle<()>) {
        async fn rpc(State(chain): State<DevChain>, Json(body): Json<Value>) -> Json<Value> {
            let id = body["id"].clone();
            let method = body["method"].as_str().unwrap_or_default();
            let response = match chain.handle(method, &body["params"]) {
                Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
                Err((code, message)) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": code, "message": message },
                }),
            };
            Json(response)
        }

        let app = Router::new().route("/", post(rpc)).with_state(self.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), handle)
    }
}
