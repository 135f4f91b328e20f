//! HTTP client for the tracker service.
//!
//! Calls `/contributions`, `/contributions/me` and `/contributions/total`.

use contribute_common::contribution::{Contribution, ContributionTotals, NewContribution};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The transaction hash is already recorded.
    #[error("duplicate transaction: {0}")]
    DuplicateTransaction(String),
    /// The tracker rejected the request shape.
    #[error("validation error: {0}")]
    Validation(String),
    #[error("tracker returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("tracker unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct TrackerClient {
    client: reqwest::Client,
    base_url: String,
}

impl TrackerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn error_from(resp: reqwest::Response) -> TrackerError {
        let status = resp.status();
        let message = resp
            .json::<ErrorBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
        match status {
            StatusCode::CONFLICT => TrackerError::DuplicateTransaction(message),
            StatusCode::BAD_REQUEST => TrackerError::Validation(message),
            other => TrackerError::Status {
                status: other.as_u16(),
                message,
            },
        }
    }

    /// Record a confirmed contribution.
    pub async fn save_contribution(
        &self,
        new: &NewContribution,
    ) -> Result<Contribution, TrackerError> {
        let resp = self
            .client
            .post(format!("{}/contributions", self.base_url))
            .json(new)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        Ok(resp.json().await?)
    }

    /// Contributions sent from `address`; empty when it has none.
    pub async fn my_contributions(&self, address: &str) -> Result<Vec<Contribution>, TrackerError> {
        let resp = self
            .client
            .get(format!("{}/contributions/me", self.base_url))
            .query(&[("address", address)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        Ok(resp.json().await?)
    }

    pub async fn totals(&self) -> Result<ContributionTotals, TrackerError> {
        let resp = self
            .client
            .get(format!("{}/contributions/total", self.base_url))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        Ok(resp.json().await?)
    }
}
