use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::network::Network;

/// Fixed ratio between the native asset and the internal reward unit:
/// 1 ETH = 1000 XTK.
pub const CONVERSION_RATE: u32 = 1000;

/// Canonical form of a sender address. Applied on every write and every
/// lookup so history queries are case-insensitive.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Canonical form of a transaction hash. Hex hashes compare
/// case-insensitively, so the dedup key is the trimmed lowercase form.
pub fn normalize_tx_hash(tx_hash: &str) -> String {
    tx_hash.trim().to_ascii_lowercase()
}

/// Native amount expressed in reward units.
pub fn to_converted_units(native_amount: Decimal, rate: Decimal) -> Decimal {
    (native_amount * rate).normalize()
}

/// One persisted contribution. Immutable once stored.
///
/// Amounts are written to JSON as decimal strings so 18-decimal values keep
/// every digit. Numbers are still accepted on input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    #[serde(rename = "from")]
    pub sender: String,
    pub tx_hash: String,
    pub network: Network,
    #[serde(
        rename = "amountEth",
        serialize_with = "rust_decimal::serde::str::serialize"
    )]
    pub native_amount: Decimal,
    #[serde(
        rename = "tokenAmount",
        serialize_with = "rust_decimal::serde::str::serialize"
    )]
    pub converted_amount: Decimal,
    #[serde(rename = "timestamp")]
    pub recorded_at: DateTime<Utc>,
}

/// Body of `POST /contributions`.
///
/// `tokenAmount` is optional: when absent the tracker derives it from
/// `amountEth` with its conversion rate. `timestamp` is server-assigned when
/// absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContribution {
    #[serde(rename = "from")]
    pub sender: String,
    pub tx_hash: String,
    pub network: Network,
    #[serde(
        rename = "amountEth",
        serialize_with = "rust_decimal::serde::str::serialize"
    )]
    pub native_amount: Decimal,
    #[serde(
        rename = "tokenAmount",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "rust_decimal::serde::str_option::serialize"
    )]
    pub converted_amount: Option<Decimal>,
    #[serde(rename = "timestamp", default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl NewContribution {
    /// The supplied converted amount, or the native amount converted at `rate`.
    pub fn converted_amount_or_derive(&self, rate: Decimal) -> Decimal {
        self.converted_amount
            .unwrap_or_else(|| to_converted_units(self.native_amount, rate))
    }

    /// Resolve into the stored shape: normalized sender and hash, converted
    /// amount filled in, timestamp defaulted to `now`.
    pub fn into_record(self, rate: Decimal, now: DateTime<Utc>) -> Contribution {
        let converted_amount = self.converted_amount_or_derive(rate);
        Contribution {
            sender: normalize_address(&self.sender),
            tx_hash: normalize_tx_hash(&self.tx_hash),
            network: self.network,
            native_amount: self.native_amount,
            converted_amount,
            recorded_at: self.recorded_at.unwrap_or(now),
        }
    }
}

/// Sums over every stored contribution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionTotals {
    #[serde(
        rename = "totalEth",
        serialize_with = "rust_decimal::serde::str::serialize"
    )]
    pub total_native: Decimal,
    #[serde(
        rename = "totalTokens",
        serialize_with = "rust_decimal::serde::str::serialize"
    )]
    pub total_converted: Decimal,
    #[serde(default)]
    pub count: u64,
}

impl ContributionTotals {
    pub fn add(&mut self, record: &Contribution) {
        self.total_native += record.native_amount;
        self.total_converted += record.converted_amount;
        self.count += 1;
    }
}
