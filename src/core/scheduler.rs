//! Interval tickers that enumerate tracked addresses and enqueue fetch jobs

use crate::db::AddressDirectory;
use crate::error::{ConfigError, JobError};
use crate::jobs::queue::JobQueue;
use crate::jobs::types::Job;
use crate::metrics::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerKind {
    /// Emits one `FetchWorkers` job per address.
    Workers,
    /// Emits one `FetchBalance` job per address.
    Balance,
}

impl TickerKind {
    pub fn name(&self) -> &'static str {
        match self {
            TickerKind::Workers => "worker-ticker",
            TickerKind::Balance => "balance-ticker",
        }
    }

    fn job(&self, pool_name: &str, address: &str) -> Job {
        match self {
            TickerKind::Workers => Job::fetch_workers(pool_name, address),
            TickerKind::Balance => Job::fetch_balance(pool_name, address),
        }
    }
}

#[derive(Clone)]
struct TickSource {
    kind: TickerKind,
    directory: Arc<dyn AddressDirectory>,
    queue: JobQueue,
    pools: Arc<Vec<String>>,
    metrics: Option<Arc<Metrics>>,
}

impl TickSource {
    async fn run_tick(&self) -> Result<usize, JobError> {
        let mut submitted = 0;
        for pool_name in self.pools.iter() {
            let addresses = match self.directory.get_addresses(pool_name).await {
                Ok(addresses) => addresses,
                Err(e) => {
                    error!(
                        ticker = self.kind.name(),
                        pool = %pool_name,
                        error = %e,
                        "JobScheduler: failed to list addresses for {}, skipping this tick",
                        pool_name
                    );
                    if let Some(ref metrics) = self.metrics {
                        metrics.enumeration_failures_total.inc();
                    }
                    continue;
                }
            };

            for address in &addresses {
                let id = self
                    .queue
                    .submit(self.kind.job(pool_name, address))
                    .await
                    .ok_or(JobError::QueueClosed)?;
                debug!(
                    ticker = self.kind.name(),
                    job_id = id,
                    pool = %pool_name,
                    address = %address,
                    "JobScheduler: enqueued job for {}",
                    address
                );
                submitted += 1;
            }
        }
        Ok(submitted)
    }
}

/// Ticker producer that periodically enqueues jobs for every tracked address.
pub struct JobScheduler {
    source: TickSource,
    period: Duration,
    shutdown: CancellationToken,
    handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl JobScheduler {
    /// Create a new scheduler
    ///
    /// # Arguments
    /// * `kind` - Which job type each tick emits
    /// * `directory` - Source of tracked addresses
    /// * `queue` - Job queue the workers read from
    /// * `pools` - Pool names enumerated on every tick
    /// * `period` - Time between ticks; the first tick fires one period after start
    pub fn new(
        kind: TickerKind,
        directory: Arc<dyn AddressDirectory>,
        queue: JobQueue,
        pools: Vec<String>,
        period: Duration,
    ) -> Result<Self, ConfigError> {
        if period.is_zero() {
            return Err(ConfigError::Invalid(format!(
                "{}: interval must be > 0",
                kind.name()
            )));
        }

        info!(
            ticker = kind.name(),
            interval_secs = period.as_secs(),
            pools = ?pools,
            "JobScheduler: created {} with interval {}s",
            kind.name(),
            period.as_secs()
        );

        Ok(Self {
            source: TickSource {
                kind,
                directory,
                queue,
                pools: Arc::new(pools),
                metrics: None,
            },
            period,
            shutdown: CancellationToken::new(),
            handle: Arc::new(RwLock::new(None)),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.source.metrics = Some(metrics);
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn kind(&self) -> TickerKind {
        self.source.kind
    }

    /// Run one enumeration pass and return the number of jobs submitted.
    ///
    /// A pool whose addresses cannot be listed is skipped; only a closed
    /// queue is reported as an error.
    pub async fn run_tick(&self) -> Result<usize, JobError> {
        self.source.run_tick().await
    }

    /// Start the ticker loop in the background. Does nothing if it is already running.
    pub async fn start(&self) {
        let mut slot = self.handle.write().await;
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!(ticker = self.source.kind.name(), "JobScheduler: already running");
            return;
        }

        let source = self.source.clone();
        let period = self.period;
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let name = source.kind.name();
            info!(ticker = name, "JobScheduler: {} started", name);

            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            // Late ticks fire back to back; none is dropped.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    result = source.run_tick() => match result {
                        Ok(count) => {
                            info!(
                                ticker = name,
                                jobs = count,
                                "JobScheduler: tick enqueued {} jobs",
                                count
                            );
                        }
                        Err(e) => {
                            warn!(ticker = name, error = %e, "JobScheduler: stopping");
                            break;
                        }
                    }
                }
            }

            info!(ticker = name, "JobScheduler: {} exited", name);
        });

        *slot = Some(handle);
    }

    /// Stop the ticker loop
    pub async fn stop(&self) {
        let mut handle = self.handle.write().await;
        if let Some(h) = handle.take() {
            h.abort();
            info!(ticker = self.source.kind.name(), "JobScheduler: stopped");
        }
    }

    /// Check if the ticker loop is running
    pub async fn is_running(&self) -> bool {
        let handle = self.handle.read().await;
        handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}
