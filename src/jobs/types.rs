//! Job and outcome types flowing through the dispatch engine

use crate::models::Balance;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    FetchWorkers,
    FetchChart,
    FetchBalance,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::FetchWorkers => "fetch_workers",
            JobKind::FetchChart => "fetch_chart",
            JobKind::FetchBalance => "fetch_balance",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of scheduled work. `id` is assigned by the queue on submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub pool_name: String,
    pub address: String,
    pub worker_name: String,
    pub kind: JobKind,
}

impl Job {
    pub fn fetch_workers(pool_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self::new(JobKind::FetchWorkers, pool_name, address, String::new())
    }

    pub fn fetch_chart(
        pool_name: impl Into<String>,
        address: impl Into<String>,
        worker_name: impl Into<String>,
    ) -> Self {
        Self::new(JobKind::FetchChart, pool_name, address, worker_name)
    }

    pub fn fetch_balance(pool_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self::new(JobKind::FetchBalance, pool_name, address, String::new())
    }

    fn new(
        kind: JobKind,
        pool_name: impl Into<String>,
        address: impl Into<String>,
        worker_name: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            pool_name: pool_name.into(),
            address: address.into(),
            worker_name: worker_name.into(),
            kind,
        }
    }
}

/// What a successful job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    WorkersListed {
        discovered: usize,
        offline: usize,
        notified: usize,
    },
    ChartSaved {
        points: usize,
    },
    BalanceSaved {
        balance: Balance,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Completed(JobReport),
    Failed(String),
    TimedOut(Duration),
    /// Cancelled while draining on shutdown.
    Aborted,
}

impl OutcomeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Completed(_) => "completed",
            OutcomeStatus::Failed(_) => "failed",
            OutcomeStatus::TimedOut(_) => "timed_out",
            OutcomeStatus::Aborted => "aborted",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Completed(_))
    }
}

/// Result record sent from a fetch task to the observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: u64,
    pub kind: JobKind,
    pub worker_id: usize,
    pub pool_name: String,
    pub address: String,
    pub worker_name: String,
    pub elapsed: Duration,
    pub status: OutcomeStatus,
}

impl JobOutcome {
    pub fn new(job: &Job, worker_id: usize, elapsed: Duration, status: OutcomeStatus) -> Self {
        Self {
            job_id: job.id,
            kind: job.kind,
            worker_id,
            pool_name: job.pool_name.clone(),
            address: job.address.clone(),
            worker_name: job.worker_name.clone(),
            elapsed,
            status,
        }
    }
}
