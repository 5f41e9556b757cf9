//! In-memory collaborators shared by unit and integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use fairshares::db::{AddressDirectory, ResultSink};
use fairshares::error::{FetchError, NotifyError, StoreError};
use fairshares::jobs::{JobContext, JobQueue, JobReceiver};
use fairshares::models::{Balance, ChartData, ChartPoint, WorkerStatus};
use fairshares::services::{Delivery, FetchGateway, NotificationService};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Address directory returning fixed addresses, or an error for listed pools.
#[derive(Default)]
pub struct StaticDirectory {
    addresses: HashMap<String, Vec<String>>,
    failing: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, pool: &str, addresses: &[&str]) -> Self {
        self.addresses.insert(
            pool.to_string(),
            addresses.iter().map(|a| a.to_string()).collect(),
        );
        self
    }

    pub fn failing(mut self, pool: &str) -> Self {
        self.failing.push(pool.to_string());
        self
    }
}

#[async_trait]
impl AddressDirectory for StaticDirectory {
    async fn get_addresses(&self, pool_name: &str) -> Result<Vec<String>, StoreError> {
        self.calls.lock().unwrap().push(pool_name.to_string());
        if self.failing.iter().any(|p| p == pool_name) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(self.addresses.get(pool_name).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    ListWorkers(String),
    GetChart(String, String),
    GetBalance(String),
}

/// Scriptable pool gateway recording every call and when it happened.
pub struct MockGateway {
    workers: Vec<WorkerStatus>,
    chart: ChartData,
    balance: Balance,
    delay: Duration,
    fail: bool,
    calls: Mutex<Vec<(Instant, GatewayCall)>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            workers: Vec::new(),
            chart: sample_chart(3),
            balance: 1_500_000_000_000_000_000,
            delay: Duration::ZERO,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: Vec<WorkerStatus>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_balance(mut self, balance: Balance) -> Self {
        self.balance = balance;
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    async fn answer<T>(&self, call: GatewayCall, value: T) -> Result<T, FetchError> {
        self.calls.lock().unwrap().push((Instant::now(), call));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(FetchError::Status(503));
        }
        Ok(value)
    }
}

#[async_trait]
impl FetchGateway for MockGateway {
    async fn list_workers(&self, address: &str) -> Result<Vec<WorkerStatus>, FetchError> {
        self.answer(GatewayCall::ListWorkers(address.to_string()), self.workers.clone())
            .await
    }

    async fn get_chart(&self, address: &str, worker_name: &str) -> Result<ChartData, FetchError> {
        self.answer(
            GatewayCall::GetChart(address.to_string(), worker_name.to_string()),
            self.chart.clone(),
        )
        .await
    }

    async fn get_balance(&self, address: &str) -> Result<Balance, FetchError> {
        self.answer(GatewayCall::GetBalance(address.to_string()), self.balance)
            .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedChart {
    pub pool_name: String,
    pub address: String,
    pub worker_name: String,
    pub points: usize,
}

#[derive(Default)]
pub struct RecordingSink {
    fail: bool,
    charts: Mutex<Vec<SavedChart>>,
    balances: Mutex<Vec<(String, String, Balance)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn charts(&self) -> Vec<SavedChart> {
        self.charts.lock().unwrap().clone()
    }

    pub fn balances(&self) -> Vec<(String, String, Balance)> {
        self.balances.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn save_worker_chart(
        &self,
        pool_name: &str,
        address: &str,
        worker_name: &str,
        chart: &ChartData,
    ) -> Result<usize, StoreError> {
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.charts.lock().unwrap().push(SavedChart {
            pool_name: pool_name.to_string(),
            address: address.to_string(),
            worker_name: worker_name.to_string(),
            points: chart.len(),
        });
        Ok(chart.len())
    }

    async fn save_balance(
        &self,
        pool_name: &str,
        address: &str,
        balance: Balance,
    ) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.balances
            .lock()
            .unwrap()
            .push((pool_name.to_string(), address.to_string(), balance));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn notify(&self, worker_name: &str) -> Result<Delivery, NotifyError> {
        self.calls.lock().unwrap().push(worker_name.to_string());
        if self.fail {
            return Err(NotifyError::Rejected {
                status: 401,
                body: "unauthorized".to_string(),
            });
        }
        Ok(Delivery::Sent(1))
    }
}

/// Collaborators plus the queue they were wired to.
pub struct Harness {
    pub gateway: Arc<MockGateway>,
    pub sink: Arc<RecordingSink>,
    pub notifier: Arc<RecordingNotifier>,
    pub queue: JobQueue,
    pub receiver: JobReceiver,
}

impl Harness {
    pub fn new(gateway: MockGateway, capacity: usize) -> Self {
        Self::with_parts(gateway, RecordingSink::new(), RecordingNotifier::new(), capacity)
    }

    pub fn with_parts(
        gateway: MockGateway,
        sink: RecordingSink,
        notifier: RecordingNotifier,
        capacity: usize,
    ) -> Self {
        let (queue, receiver) = JobQueue::new(capacity);
        Self {
            gateway: Arc::new(gateway),
            sink: Arc::new(sink),
            notifier: Arc::new(notifier),
            queue,
            receiver,
        }
    }

    pub fn context(&self) -> JobContext {
        JobContext::new(
            self.gateway.clone(),
            self.sink.clone(),
            self.notifier.clone(),
            self.queue.clone(),
        )
    }
}

pub fn sample_chart(points: usize) -> ChartData {
    (0..points)
        .map(|i| ChartPoint {
            timestamp: 1_650_000_000 + (i as i64 * 600),
            effective_hashrate: 95_000_000.0,
            average_effective_hashrate: 94_000_000.0,
            reported_hashrate: 96_000_000.0,
            valid_shares: 40 + i as u64,
            stale_shares: 1,
            invalid_shares: 0,
        })
        .collect()
}
