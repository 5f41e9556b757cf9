//! Result observers draining the outcome channel

use crate::jobs::types::{JobOutcome, OutcomeStatus};
use crate::metrics::Metrics;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

pub const DEFAULT_RESULT_CAPACITY: usize = 64;

/// Running totals of observed outcomes, shared with the status server.
#[derive(Debug, Default)]
pub struct OutcomeTotals {
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    aborted: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TotalsSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub aborted: u64,
}

impl TotalsSnapshot {
    pub fn total(&self) -> u64 {
        self.completed + self.failed + self.timed_out + self.aborted
    }
}

impl OutcomeTotals {
    pub fn record(&self, status: &OutcomeStatus) {
        let counter = match status {
            OutcomeStatus::Completed(_) => &self.completed,
            OutcomeStatus::Failed(_) => &self.failed,
            OutcomeStatus::TimedOut(_) => &self.timed_out,
            OutcomeStatus::Aborted => &self.aborted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TotalsSnapshot {
        TotalsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }
}

/// Spawn `count` observers sharing one outcome receiver.
///
/// Observers run until every sender is dropped, so outcomes emitted while the
/// workers drain on shutdown are still recorded.
pub fn spawn_observers(
    count: usize,
    receiver: mpsc::Receiver<JobOutcome>,
    totals: Arc<OutcomeTotals>,
    metrics: Option<Arc<Metrics>>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    (0..count.max(1))
        .map(|id| {
            let receiver = receiver.clone();
            let totals = totals.clone();
            let metrics = metrics.clone();
            tokio::spawn(async move {
                loop {
                    let outcome = receiver.lock().await.recv().await;
                    let Some(outcome) = outcome else { break };
                    observe(id, &outcome, &totals, metrics.as_deref());
                }
                info!(observer_id = id, "ResultObserver {}: stopped", id);
            })
        })
        .collect()
}

pub fn observe(
    observer_id: usize,
    outcome: &JobOutcome,
    totals: &OutcomeTotals,
    metrics: Option<&Metrics>,
) {
    totals.record(&outcome.status);
    if let Some(metrics) = metrics {
        metrics
            .job_outcomes_total
            .with_label_values(&[outcome.kind.as_str(), outcome.status.label()])
            .inc();
    }

    if outcome.status.is_success() {
        info!(
            observer_id,
            job_id = outcome.job_id,
            kind = %outcome.kind,
            worker_id = outcome.worker_id,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "ResultObserver {}: job {} ({}) completed",
            observer_id,
            outcome.job_id,
            outcome.kind
        );
    } else {
        warn!(
            observer_id,
            job_id = outcome.job_id,
            kind = %outcome.kind,
            worker_id = outcome.worker_id,
            address = %outcome.address,
            status = outcome.status.label(),
            "ResultObserver {}: job {} ({}) {}",
            observer_id,
            outcome.job_id,
            outcome.kind,
            outcome.status.label()
        );
    }
}
