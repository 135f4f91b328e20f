use chrono::Utc;
use contribute_common::contribution::{
    normalize_address, Contribution, ContributionTotals, NewContribution, CONVERSION_RATE,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::{ContributionStore, StoreError};

/// Process-local store keyed by transaction hash.
///
/// The map's entry lock makes insert-if-absent atomic per hash, which gives
/// the same duplicate semantics as the unique index in PostgreSQL.
#[derive(Debug, Default)]
pub struct MemoryContributionStore {
    records: DashMap<String, Contribution>,
}

impl MemoryContributionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ContributionStore for MemoryContributionStore {
    async fn insert(&self, new: NewContribution) -> Result<Contribution, StoreError> {
        let record = new.into_record(Decimal::from(CONVERSION_RATE), Utc::now());
        match self.records.entry(record.tx_hash.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateTransaction(record.tx_hash)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn find_by_sender(&self, address: &str) -> Result<Vec<Contribution>, StoreError> {
        let sender = normalize_address(address);
        let mut found: Vec<Contribution> = self
            .records
            .iter()
            .filter(|entry| entry.value().sender == sender)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(found)
    }

    async fn aggregate_totals(&self) -> Result<ContributionTotals, StoreError> {
        let mut totals = ContributionTotals::default();
        for entry in self.records.iter() {
            totals.add(entry.value());
        }
        Ok(totals)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
