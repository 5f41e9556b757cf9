//! Pool API interface used by the job handlers.

use crate::error::FetchError;
use crate::models::{Balance, ChartData, WorkerStatus};
use async_trait::async_trait;

/// Remote operations against a mining pool backend.
///
/// Implementations do not apply deadlines themselves; the job handler wraps
/// every call in its own timeout.
#[async_trait]
pub trait FetchGateway: Send + Sync {
    /// List the workers reporting under an address
    async fn list_workers(&self, address: &str) -> Result<Vec<WorkerStatus>, FetchError>;

    /// Get the performance chart of one worker
    async fn get_chart(&self, address: &str, worker_name: &str) -> Result<ChartData, FetchError>;

    /// Get the unpaid balance of an address
    async fn get_balance(&self, address: &str) -> Result<Balance, FetchError>;
}
