//! Dispatch worker pool
//!
//! Each worker dequeues a job, hands the fetch to its own task group and
//! paces before taking the next job. The pool size therefore bounds the
//! dequeue rate, not the number of fetches in flight.

use crate::config::SchedulerConfig;
use crate::error::{FetchError, JobError};
use crate::jobs::context::JobContext;
use crate::jobs::handlers;
use crate::jobs::queue::JobReceiver;
use crate::jobs::types::{Job, JobOutcome, OutcomeStatus};
use crate::metrics::Metrics;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the dispatch workers
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub pool_size: usize,
    pub pacing: Duration,
    pub drain_grace: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pool_size: 1,
            pacing: Duration::from_secs(2),
            drain_grace: Duration::from_secs(15),
        }
    }
}

impl From<&SchedulerConfig> for DispatchConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            pool_size: config.worker_pool_size,
            pacing: config.pacing(),
            drain_grace: config.drain_grace(),
        }
    }
}

/// Tracks a running fetch in the in-flight gauge, including aborted ones.
struct InFlightGuard(Option<Arc<Metrics>>);

impl InFlightGuard {
    fn new(metrics: Option<Arc<Metrics>>) -> Self {
        if let Some(ref m) = metrics {
            m.fetch_tasks_in_flight.inc();
        }
        Self(metrics)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(ref m) = self.0 {
            m.fetch_tasks_in_flight.dec();
        }
    }
}

pub struct WorkerPool {
    config: DispatchConfig,
    ctx: Arc<JobContext>,
    receiver: JobReceiver,
    results: mpsc::Sender<JobOutcome>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        config: DispatchConfig,
        ctx: Arc<JobContext>,
        receiver: JobReceiver,
        results: mpsc::Sender<JobOutcome>,
    ) -> Self {
        Self {
            config,
            ctx,
            receiver,
            results,
            shutdown: CancellationToken::new(),
        }
    }

    /// Workers stop dequeuing once this token is cancelled and drain their tasks.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Spawn all workers and return their handles. Each handle completes after
    /// the worker has drained its in-flight fetches.
    pub fn start(self) -> Vec<tokio::task::JoinHandle<()>> {
        info!(
            pool_size = self.config.pool_size,
            pacing_ms = self.config.pacing.as_millis() as u64,
            "WorkerPool: starting {} dispatch workers",
            self.config.pool_size
        );

        (0..self.config.pool_size.max(1))
            .map(|id| {
                let worker = DispatchWorker {
                    id,
                    pacing: self.config.pacing,
                    drain_grace: self.config.drain_grace,
                    ctx: self.ctx.clone(),
                    receiver: self.receiver.clone(),
                    results: self.results.clone(),
                    shutdown: self.shutdown.clone(),
                    in_flight: JoinSet::new(),
                    pending: HashMap::new(),
                };
                tokio::spawn(worker.run())
            })
            .collect()
    }
}

struct DispatchWorker {
    id: usize,
    pacing: Duration,
    drain_grace: Duration,
    ctx: Arc<JobContext>,
    receiver: JobReceiver,
    results: mpsc::Sender<JobOutcome>,
    shutdown: CancellationToken,
    in_flight: JoinSet<()>,
    pending: HashMap<Id, Job>,
}

impl DispatchWorker {
    async fn run(mut self) {
        info!(worker_id = self.id, "DispatchWorker {}: started", self.id);

        loop {
            let job = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                job = self.receiver.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            info!(
                worker_id = self.id,
                job_id = job.id,
                kind = %job.kind,
                pool = %job.pool_name,
                address = %job.address,
                worker = %job.worker_name,
                "DispatchWorker {}: job {} ({})",
                self.id,
                job.id,
                job.kind
            );
            if let Some(ref metrics) = self.ctx.metrics {
                metrics
                    .jobs_dispatched_total
                    .with_label_values(&[job.kind.as_str()])
                    .inc();
            }

            self.spawn_fetch(job);
            self.reap_finished().await;

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.pacing) => {}
            }
        }

        self.drain().await;
        info!(worker_id = self.id, "DispatchWorker {}: stopped", self.id);
    }

    fn spawn_fetch(&mut self, job: Job) {
        let ctx = self.ctx.clone();
        let results = self.results.clone();
        let worker_id = self.id;
        let tracked = job.clone();

        let handle = self.in_flight.spawn(async move {
            let _guard = InFlightGuard::new(ctx.metrics.clone());
            let started = Instant::now();

            let status = match handlers::run_job(&job, &ctx).await {
                Ok(report) => OutcomeStatus::Completed(report),
                Err(JobError::Fetch(FetchError::Timeout(deadline))) => {
                    OutcomeStatus::TimedOut(deadline)
                }
                Err(e) => OutcomeStatus::Failed(e.to_string()),
            };
            let elapsed = started.elapsed();

            if let Some(ref metrics) = ctx.metrics {
                metrics
                    .fetch_duration_seconds
                    .with_label_values(&[job.kind.as_str()])
                    .observe(elapsed.as_secs_f64());
            }

            match &status {
                OutcomeStatus::Completed(report) => debug!(
                    worker_id,
                    job_id = job.id,
                    kind = %job.kind,
                    report = ?report,
                    "Fetch task: job {} finished",
                    job.id
                ),
                other => warn!(
                    worker_id,
                    job_id = job.id,
                    kind = %job.kind,
                    address = %job.address,
                    worker = %job.worker_name,
                    status = ?other,
                    "Fetch task: job {} dropped",
                    job.id
                ),
            }

            if results
                .send(JobOutcome::new(&job, worker_id, elapsed, status))
                .await
                .is_err()
            {
                debug!(job_id = job.id, "Fetch task: result channel closed");
            }
        });
        self.pending.insert(handle.id(), tracked);
    }

    /// Collect tasks that already finished without waiting for the others.
    async fn reap_finished(&mut self) {
        loop {
            let joined = match self.in_flight.join_next_with_id().now_or_never() {
                Some(Some(joined)) => joined,
                _ => break,
            };
            self.settle(joined).await;
        }
    }

    /// Wait for in-flight tasks up to the grace period, then abort the rest.
    async fn drain(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        info!(
            worker_id = self.id,
            in_flight = self.in_flight.len(),
            "DispatchWorker {}: draining {} fetch tasks",
            self.id,
            self.in_flight.len()
        );

        let grace = tokio::time::sleep(self.drain_grace);
        tokio::pin!(grace);
        let mut aborted = false;

        loop {
            let joined = tokio::select! {
                joined = self.in_flight.join_next_with_id() => match joined {
                    Some(joined) => joined,
                    None => break,
                },
                _ = &mut grace, if !aborted => {
                    warn!(
                        worker_id = self.id,
                        remaining = self.in_flight.len(),
                        "DispatchWorker {}: drain grace elapsed, aborting {} tasks",
                        self.id,
                        self.in_flight.len()
                    );
                    self.in_flight.abort_all();
                    aborted = true;
                    continue;
                }
            };
            self.settle(joined).await;
        }
    }

    async fn settle(&mut self, joined: Result<(Id, ()), JoinError>) {
        let err = match joined {
            Ok((id, ())) => {
                self.pending.remove(&id);
                return;
            }
            Err(err) => err,
        };

        let Some(job) = self.pending.remove(&err.id()) else {
            return;
        };
        let status = if err.is_cancelled() {
            OutcomeStatus::Aborted
        } else {
            error!(
                worker_id = self.id,
                job_id = job.id,
                error = %err,
                "DispatchWorker {}: fetch task for job {} panicked",
                self.id,
                job.id
            );
            OutcomeStatus::Failed(format!("fetch task panicked: {}", err))
        };

        let outcome = JobOutcome::new(&job, self.id, Duration::ZERO, status);
        if self.results.send(outcome).await.is_err() {
            debug!(job_id = job.id, "DispatchWorker: result channel closed");
        }
    }
}
