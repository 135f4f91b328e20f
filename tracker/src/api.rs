use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use contribute_common::contribution::{
    normalize_tx_hash, Contribution, ContributionTotals, NewContribution,
};
use contribute_common::network::Network;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::store::ContributionStore;

pub struct AppState<S> {
    pub store: S,
    /// Reward units per native unit, used when a write omits `tokenAmount`.
    pub conversion_rate: Decimal,
}

impl<S: ContributionStore> AppState<S> {
    pub fn new(store: S, conversion_rate: Decimal) -> Self {
        Self {
            store,
            conversion_rate,
        }
    }
}

// ─── API types ───────────────────────────────────────────────────────────────

/// Loosely typed write body so missing or out-of-range fields surface as
/// validation errors instead of extractor rejections.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContributionRequest {
    pub from: Option<String>,
    pub tx_hash: Option<String>,
    pub network: Option<String>,
    pub amount_eth: Option<Decimal>,
    pub token_amount: Option<Decimal>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CreateContributionRequest {
    pub fn validate(self, conversion_rate: Decimal) -> Result<NewContribution, ApiError> {
        let sender = required("from", self.from)?;
        let tx_hash = normalize_tx_hash(&required("txHash", self.tx_hash)?);
        let network = required("network", self.network)?
            .parse::<Network>()
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        let native_amount = self
            .amount_eth
            .ok_or_else(|| ApiError::Validation("amountEth is required".to_string()))?;
        if native_amount < Decimal::ZERO {
            return Err(ApiError::Validation(
                "amountEth must be non-negative".to_string(),
            ));
        }
        if let Some(token_amount) = self.token_amount {
            if token_amount < Decimal::ZERO {
                return Err(ApiError::Validation(
                    "tokenAmount must be non-negative".to_string(),
                ));
            }
        }

        let mut new = NewContribution {
            sender,
            tx_hash,
            network,
            native_amount,
            converted_amount: self.token_amount,
            recorded_at: self.timestamp,
        };
        new.converted_amount = Some(new.converted_amount_or_derive(conversion_rate));
        Ok(new)
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::Validation(format!("{field} is required"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn create_contribution<S: ContributionStore>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateContributionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Contribution>), ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let new = request.validate(state.conversion_rate)?;
    let stored = state.store.insert(new).await?;
    info!(
        tx_hash = %stored.tx_hash,
        sender = %stored.sender,
        amount = %stored.native_amount,
        "contribution recorded"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn contributions_by_sender<S: ContributionStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Contribution>>, ApiError> {
    let address = match query.address.as_deref().map(str::trim) {
        Some(a) if !a.is_empty() => a,
        _ => return Ok(Json(Vec::new())),
    };
    let records = state.store.find_by_sender(address).await?;
    debug!(address, count = records.len(), "history lookup");
    Ok(Json(records))
}

async fn contribution_totals<S: ContributionStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<ContributionTotals>, ApiError> {
    Ok(Json(state.store.aggregate_totals().await?))
}

async fn health<S: ContributionStore>(State(state): State<Arc<AppState<S>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        store: state.store.backend_name().to_string(),
    })
}

/// All tracker routes over the given state.
pub fn router<S: ContributionStore>(state: Arc<AppState<S>>, cors: CorsLayer) -> Router {
    Router::new()
        .route(
            "/contributions",
            get(contributions_by_sender::<S>).post(create_contribution::<S>),
        )
        .route("/contributions/me", get(contributions_by_sender::<S>))
        .route("/contributions/total", get(contribution_totals::<S>))
        .route("/health", get(health::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
