use chrono::{DateTime, Utc};
use contribute_common::contribution::{
    normalize_address, Contribution, ContributionTotals, NewContribution, CONVERSION_RATE,
};
use contribute_common::network::Network;
use deadpool_postgres::{Config, Pool, Runtime};
use rust_decimal::Decimal;
use tokio_postgres::{NoTls, Row};
use tracing::info;

use super::{ContributionStore, StoreError};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const COLUMNS: &str = "sender, tx_hash, network, native_amount, converted_amount, recorded_at";

/// PostgreSQL-backed store. The unique index on `tx_hash` enforces dedup.
#[derive(Clone)]
pub struct PgContributionStore {
    pool: Pool,
}

impl PgContributionStore {
    /// Build a connection pool and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.url = Some(database_url.to_string());
        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA).await?;
        info!("contributions schema ready");
        Ok(())
    }

    /// Remove every record. Test fixtures only.
    pub async fn truncate(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.batch_execute("TRUNCATE contributions").await?;
        Ok(())
    }
}

fn row_to_contribution(row: &Row) -> Result<Contribution, StoreError> {
    let network: String = row.try_get("network")?;
    let network = network
        .parse::<Network>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let recorded_at: DateTime<Utc> = row.try_get("recorded_at")?;
    Ok(Contribution {
        sender: row.try_get("sender")?,
        tx_hash: row.try_get("tx_hash")?,
        network,
        native_amount: row.try_get("native_amount")?,
        converted_amount: row.try_get("converted_amount")?,
        recorded_at,
    })
}

impl ContributionStore for PgContributionStore {
    async fn insert(&self, new: NewContribution) -> Result<Contribution, StoreError> {
        let record = new.into_record(Decimal::from(CONVERSION_RATE), Utc::now());
        let network = record.network.as_str();
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO contributions ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (tx_hash) DO NOTHING RETURNING {COLUMNS}"
        );
        let row = client
            .query_opt(
                &sql,
                &[
                    &record.sender,
                    &record.tx_hash,
                    &network,
                    &record.native_amount,
                    &record.converted_amount,
                    &record.recorded_at,
                ],
            )
            .await?;
        match row {
            Some(row) => row_to_contribution(&row),
            None => Err(StoreError::DuplicateTransaction(record.tx_hash)),
        }
    }

    async fn find_by_sender(&self, address: &str) -> Result<Vec<Contribution>, StoreError> {
        let sender = normalize_address(address);
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {COLUMNS} FROM contributions WHERE sender = $1 ORDER BY recorded_at DESC"
        );
        let rows = client.query(&sql, &[&sender]).await?;
        rows.iter().map(row_to_contribution).collect()
    }

    async fn aggregate_totals(&self) -> Result<ContributionTotals, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT COALESCE(SUM(native_amount), 0) AS total_native, \
                        COALESCE(SUM(converted_amount), 0) AS total_converted, \
                        COUNT(*) AS count \
                 FROM contributions",
                &[],
            )
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(ContributionTotals {
            total_native: row.try_get::<_, Decimal>("total_native")?.normalize(),
            total_converted: row.try_get::<_, Decimal>("total_converted")?.normalize(),
            count: count.max(0) as u64,
        })
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
