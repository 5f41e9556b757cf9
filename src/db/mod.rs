//! Persistence collaborators and their SQLite implementation.

pub mod sqlite;

use crate::error::StoreError;
use crate::models::{Balance, ChartData};
use async_trait::async_trait;

pub use sqlite::{BalanceRecord, Registration, SqliteStore, DB_VERSION};

/// Source of the addresses tracked for a pool.
#[async_trait]
pub trait AddressDirectory: Send + Sync {
    async fn get_addresses(&self, pool_name: &str) -> Result<Vec<String>, StoreError>;
}

/// Destination for fetched pool data. Must be safe to call from many tasks at once.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store a worker's chart, returning the number of points written.
    async fn save_worker_chart(
        &self,
        pool_name: &str,
        address: &str,
        worker_name: &str,
        chart: &ChartData,
    ) -> Result<usize, StoreError>;

    async fn save_balance(
        &self,
        pool_name: &str,
        address: &str,
        balance: Balance,
    ) -> Result<(), StoreError>;
}
