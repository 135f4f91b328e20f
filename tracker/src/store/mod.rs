//! Contribution persistence.
//!
//! The only mutation is [`ContributionStore::insert`], which is
//! all-or-nothing. Uniqueness of `tx_hash` is the sole concurrency control:
//! two racing inserts of the same transfer resolve to one success and one
//! [`StoreError::DuplicateTransaction`].

mod memory;
mod postgres;

use std::future::Future;

use contribute_common::contribution::{Contribution, ContributionTotals, NewContribution};
use thiserror::Error;

pub use memory::MemoryContributionStore;
pub use postgres::PgContributionStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transaction {0} has already been recorded")]
    DuplicateTransaction(String),
    #[error("failed to create database pool: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),
    #[error("database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub trait ContributionStore: Send + Sync + 'static {
    /// Persist a new record. Fails with `DuplicateTransaction` if the hash is
    /// already stored. The sender is normalized and `recorded_at` assigned
    /// here when the caller did not supply them.
    fn insert(
        &self,
        new: NewContribution,
    ) -> impl Future<Output = Result<Contribution, StoreError>> + Send;

    /// All records whose normalized sender matches `address`, newest first.
    fn find_by_sender(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Vec<Contribution>, StoreError>> + Send;

    /// Sums over every record, computed by the store itself.
    fn aggregate_totals(
        &self,
    ) -> impl Future<Output = Result<ContributionTotals, StoreError>> + Send;

    fn backend_name(&self) -> &'static str;
}
