//! Submission orchestrator.
//!
//! One attempt moves through
//! `Idle → Validating → AwaitingWalletConfirmation → AwaitingChainConfirmation
//! → Persisting → Complete`. Any failure drops straight back to `Idle` with
//! the originating error. There is no retry and no resumption: a new submit
//! starts from scratch. Only one attempt may be in flight per orchestrator.

use std::str::FromStr;

use contribute_common::contribution::{
    to_converted_units, Contribution, NewContribution, CONVERSION_RATE,
};
use contribute_common::network::AssetKind;
use contribute_common::wallet::{TransferClient, WalletError, WalletSession};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::tracker_api::{TrackerClient, TrackerError};

/// Wallet amounts never carry more fractional digits than wei.
const MAX_AMOUNT_SCALE: u32 = 18;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Validating,
    AwaitingWalletConfirmation,
    AwaitingChainConfirmation,
    Persisting,
    Complete,
}

impl SubmissionState {
    /// Whether a new attempt may start from this state.
    pub fn accepts_submit(self) -> bool {
        matches!(self, SubmissionState::Idle | SubmissionState::Complete)
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Local validation failed; the wallet was not contacted.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("a contribution is already in progress")]
    Busy,
    #[error(transparent)]
    Wallet(#[from] WalletError),
    /// The transfer is on chain but the tracker did not record it.
    #[error("transaction {tx_hash} confirmed but not recorded: {source}")]
    Persistence {
        tx_hash: String,
        #[source]
        source: TrackerError,
    },
}

/// Where confirmed contributions are recorded.
#[allow(async_fn_in_trait)]
pub trait ContributionSink {
    async fn record(&self, new: NewContribution) -> Result<Contribution, TrackerError>;
}

impl ContributionSink for TrackerClient {
    async fn record(&self, new: NewContribution) -> Result<Contribution, TrackerError> {
        self.save_contribution(&new).await
    }
}

/// Result of a completed attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmissionReceipt {
    pub tx_hash: String,
    pub record: Contribution,
}

/// Parse a user-entered amount: a strictly positive decimal with at most
/// 18 fractional digits.
pub fn parse_amount(input: &str) -> Result<Decimal, SubmitError> {
    let trimmed = input.trim();
    // Plain positional notation only: no exponents ("1e3") or digit separators.
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-'))
    {
        return Err(SubmitError::InvalidInput(format!(
            "'{trimmed}' is not a decimal amount"
        )));
    }
    let amount = Decimal::from_str(trimmed)
        .map_err(|_| SubmitError::InvalidInput(format!("'{trimmed}' is not a decimal amount")))?
        .normalize();
    if amount <= Decimal::ZERO {
        return Err(SubmitError::InvalidInput(
            "amount must be greater than zero".to_string(),
        ));
    }
    if amount.scale() > MAX_AMOUNT_SCALE {
        return Err(SubmitError::InvalidInput(format!(
            "amount has more than {MAX_AMOUNT_SCALE} decimal places"
        )));
    }
    Ok(amount)
}

/// Resets the state to `Idle` unless the attempt reached `Complete`.
struct Attempt<'a> {
    state: &'a watch::Sender<SubmissionState>,
    completed: bool,
}

impl Attempt<'_> {
    fn advance(&self, next: SubmissionState) {
        self.state.send_replace(next);
    }

    fn complete(mut self) {
        self.completed = true;
        self.state.send_replace(SubmissionState::Complete);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.state.send_replace(SubmissionState::Idle);
        }
    }
}

pub struct Orchestrator<C, S> {
    client: C,
    sink: S,
    conversion_rate: Decimal,
    state: watch::Sender<SubmissionState>,
}

impl<C: TransferClient, S: ContributionSink> Orchestrator<C, S> {
    pub fn new(client: C, sink: S) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        Self {
            client,
            sink,
            conversion_rate: Decimal::from(CONVERSION_RATE),
            state,
        }
    }

    pub fn with_conversion_rate(mut self, rate: Decimal) -> Self {
        self.conversion_rate = rate;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn state(&self) -> SubmissionState {
        *self.state.borrow()
    }

    /// Observe state transitions (e.g. to drive a progress indicator).
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    fn begin(&self) -> Result<Attempt<'_>, SubmitError> {
        let accepted = self.state.send_if_modified(|state| {
            if state.accepts_submit() {
                *state = SubmissionState::Validating;
                true
            } else {
                false
            }
        });
        if !accepted {
            return Err(SubmitError::Busy);
        }
        Ok(Attempt {
            state: &self.state,
            completed: false,
        })
    }

    /// Run one contribution attempt for the connected `session`.
    ///
    /// On success the record has been persisted and the session balance
    /// refreshed. Once the transfer reaches the wallet it cannot be
    /// cancelled from here.
    pub async fn submit(
        &self,
        session: Option<&mut WalletSession>,
        amount: &str,
        asset: AssetKind,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let attempt = self.begin()?;

        let session = session.ok_or_else(|| {
            SubmitError::InvalidInput("connect a wallet first".to_string())
        })?;
        if session.network != self.client.network() {
            return Err(SubmitError::InvalidInput(format!(
                "connected to {}, contribution requires {}",
                session.network,
                self.client.network()
            )));
        }
        let amount = parse_amount(amount)?;

        attempt.advance(SubmissionState::AwaitingWalletConfirmation);
        let tx_hash = self.client.submit_transfer(session, amount, asset).await?;

        attempt.advance(SubmissionState::AwaitingChainConfirmation);
        self.client.wait_for_confirmation(&tx_hash).await?;

        attempt.advance(SubmissionState::Persisting);
        let (native_amount, converted_amount) = match asset {
            AssetKind::Native => (amount, to_converted_units(amount, self.conversion_rate)),
            AssetKind::Token => (Decimal::ZERO, amount),
        };
        let new = NewContribution {
            sender: session.address.clone(),
            tx_hash: tx_hash.clone(),
            network: session.network,
            native_amount,
            converted_amount: Some(converted_amount),
            recorded_at: None,
        };
        let record = self.sink.record(new).await.map_err(|source| {
            warn!(%tx_hash, "confirmed transfer was not recorded: {source}");
            SubmitError::Persistence {
                tx_hash: tx_hash.clone(),
                source,
            }
        })?;

        session.balance = self.client.balance(&session.address).await;
        attempt.complete();
        info!(%tx_hash, %amount, "contribution complete");
        Ok(SubmissionReceipt { tx_hash, record })
    }
}
