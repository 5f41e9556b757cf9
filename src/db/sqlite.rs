//! SQLite storage for tracked addresses, worker charts and balances

use crate::db::{AddressDirectory, ResultSink};
use crate::error::StoreError;
use crate::models::{Balance, ChartData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

/// Schema version written by [`SqliteStore::init_schema`].
pub const DB_VERSION: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRecord {
    pub pool_name: String,
    pub address: String,
    pub balance: Balance,
    pub recorded_at: DateTime<Utc>,
}

/// SQLite-backed store.
///
/// The pool holds a single connection, so concurrent fetch tasks are
/// serialized here one statement (or transaction) at a time.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) a database file.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::connect(options).await
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        // An in-memory database lives only as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Current schema version, `0` for an empty database.
    pub async fn database_version(&self) -> Result<i64, StoreError> {
        let table: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
        )
        .fetch_optional(&self.pool)
        .await?;
        if table.is_none() {
            return Ok(0);
        }

        let (version,): (Option<i64>,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;
        Ok(version.unwrap_or(0))
    }

    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS addresses (
                address TEXT PRIMARY KEY,
                pool_name TEXT NOT NULL,
                registered_at INTEGER NOT NULL
            )",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS worker_charts (
                pool_name TEXT NOT NULL,
                address TEXT NOT NULL,
                worker_name TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                effective_hashrate REAL NOT NULL,
                average_effective_hashrate REAL NOT NULL,
                reported_hashrate REAL NOT NULL,
                valid_shares INTEGER NOT NULL,
                stale_shares INTEGER NOT NULL,
                invalid_shares INTEGER NOT NULL,
                PRIMARY KEY (pool_name, address, worker_name, timestamp)
            )",
        )
        .execute(&mut *tx)
        .await?;

        // Balances are wei amounts that overflow INTEGER, so they are kept as text.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS balances (
                pool_name TEXT NOT NULL,
                address TEXT NOT NULL,
                balance TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            )",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM schema_version")
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(DB_VERSION)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Create the schema when the stored version is older than [`DB_VERSION`].
    pub async fn migrate(&self) -> Result<i64, StoreError> {
        let version = self.database_version().await?;
        if version < DB_VERSION {
            info!(from = version, to = DB_VERSION, "SqliteStore: initializing schema");
            self.init_schema().await?;
        }
        self.database_version().await
    }

    pub async fn register_address(
        &self,
        address: &str,
        pool_name: &str,
    ) -> Result<Registration, StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO addresses (address, pool_name, registered_at) VALUES (?, ?, ?)",
        )
        .bind(address)
        .bind(pool_name)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(Registration::AlreadyExists)
        } else {
            Ok(Registration::Added)
        }
    }

    pub async fn latest_balance(
        &self,
        pool_name: &str,
        address: &str,
    ) -> Result<Option<BalanceRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT balance, recorded_at FROM balances
             WHERE pool_name = ? AND address = ?
             ORDER BY recorded_at DESC, rowid DESC
             LIMIT 1",
        )
        .bind(pool_name)
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.try_get("balance")?;
        let balance = raw
            .parse::<Balance>()
            .map_err(|_| StoreError::InvalidBalance(raw.clone()))?;
        let recorded_at: i64 = row.try_get("recorded_at")?;

        Ok(Some(BalanceRecord {
            pool_name: pool_name.to_string(),
            address: address.to_string(),
            balance,
            recorded_at: DateTime::from_timestamp_millis(recorded_at).unwrap_or_default(),
        }))
    }

    pub async fn count_chart_points(
        &self,
        pool_name: &str,
        address: &str,
        worker_name: &str,
    ) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM worker_charts
             WHERE pool_name = ? AND address = ? AND worker_name = ?",
        )
        .bind(pool_name)
        .bind(address)
        .bind(worker_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl AddressDirectory for SqliteStore {
    async fn get_addresses(&self, pool_name: &str) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT address FROM addresses WHERE pool_name = ? ORDER BY rowid")
                .bind(pool_name)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(address,)| address).collect())
    }
}

#[async_trait]
impl ResultSink for SqliteStore {
    async fn save_worker_chart(
        &self,
        pool_name: &str,
        address: &str,
        worker_name: &str,
        chart: &ChartData,
    ) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        for point in chart {
            sqlx::query(
                "INSERT OR REPLACE INTO worker_charts (
                    pool_name, address, worker_name, timestamp,
                    effective_hashrate, average_effective_hashrate, reported_hashrate,
                    valid_shares, stale_shares, invalid_shares
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(pool_name)
            .bind(address)
            .bind(worker_name)
            .bind(point.timestamp)
            .bind(point.effective_hashrate)
            .bind(point.average_effective_hashrate)
            .bind(point.reported_hashrate)
            .bind(point.valid_shares as i64)
            .bind(point.stale_shares as i64)
            .bind(point.invalid_shares as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(
            pool = %pool_name,
            address = %address,
            worker = %worker_name,
            points = chart.len(),
            "SqliteStore: saved chart"
        );
        Ok(chart.len())
    }

    async fn save_balance(
        &self,
        pool_name: &str,
        address: &str,
        balance: Balance,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO balances (pool_name, address, balance, recorded_at) VALUES (?, ?, ?, ?)",
        )
        .bind(pool_name)
        .bind(address)
        .bind(balance.to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
