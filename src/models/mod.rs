//! Pool data shared between the gateway, the job handlers and storage.

pub mod pool;

pub use pool::{Balance, ChartData, ChartPoint, WorkerStatus};
