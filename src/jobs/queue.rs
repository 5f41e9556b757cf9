//! Two-stage hand-off queue between producers and dispatch workers.
//!
//! Discovery jobs (`FetchWorkers`, `FetchBalance`) and chart jobs
//! (`FetchChart`) travel on separate bounded channels. Receivers always drain
//! the chart stage first, so fan-out from discovery cannot starve behind new
//! discovery work.

use crate::jobs::types::{Job, JobKind};
use crate::metrics::Metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub const DEFAULT_STAGE_CAPACITY: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Chart,
}

impl Stage {
    pub fn of(kind: JobKind) -> Self {
        match kind {
            JobKind::FetchChart => Stage::Chart,
            JobKind::FetchWorkers | JobKind::FetchBalance => Stage::Discovery,
        }
    }
}

/// Sending half. Cheap to clone; shared by producers and fetch tasks.
#[derive(Clone)]
pub struct JobQueue {
    discovery: mpsc::Sender<Job>,
    chart: mpsc::Sender<Job>,
    next_id: Arc<AtomicU64>,
    metrics: Option<Arc<Metrics>>,
}

/// Receiving half, shared by every dispatch worker.
#[derive(Clone)]
pub struct JobReceiver {
    discovery: Arc<Mutex<mpsc::Receiver<Job>>>,
    chart: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl JobQueue {
    /// Create a queue whose stages each hold at most `capacity` pending jobs.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> (JobQueue, JobReceiver) {
        let (discovery_tx, discovery_rx) = mpsc::channel(capacity);
        let (chart_tx, chart_rx) = mpsc::channel(capacity);

        let queue = JobQueue {
            discovery: discovery_tx,
            chart: chart_tx,
            next_id: Arc::new(AtomicU64::new(1)),
            metrics: None,
        };
        let receiver = JobReceiver {
            discovery: Arc::new(Mutex::new(discovery_rx)),
            chart: Arc::new(Mutex::new(chart_rx)),
        };
        (queue, receiver)
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Hand a job to the workers, suspending while its stage is full.
    ///
    /// Returns the assigned job id, or `None` once the receivers are gone.
    pub async fn submit(&self, mut job: Job) -> Option<u64> {
        job.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = job.id;
        let kind = job.kind;

        let sender = match Stage::of(kind) {
            Stage::Discovery => &self.discovery,
            Stage::Chart => &self.chart,
        };
        sender.send(job).await.ok()?;

        if let Some(ref metrics) = self.metrics {
            metrics
                .jobs_submitted_total
                .with_label_values(&[kind.as_str()])
                .inc();
        }
        Some(id)
    }

    pub fn is_closed(&self) -> bool {
        self.discovery.is_closed() && self.chart.is_closed()
    }
}

impl JobReceiver {
    /// Wait for the next job, chart stage first.
    ///
    /// Returns `None` when both stages are closed and empty. Cancel safe.
    pub async fn recv(&self) -> Option<Job> {
        tokio::select! {
            biased;
            Some(job) = async { self.chart.lock().await.recv().await } => Some(job),
            Some(job) = async { self.discovery.lock().await.recv().await } => Some(job),
            else => None,
        }
    }

    /// Take a job if one is ready right now.
    pub async fn try_recv(&self) -> Option<Job> {
        if let Ok(job) = self.chart.lock().await.try_recv() {
            return Some(job);
        }
        self.discovery.lock().await.try_recv().ok()
    }
}
