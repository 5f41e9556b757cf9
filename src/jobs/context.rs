//! Job context for dependency injection

use crate::config::NotifyFailurePolicy;
use crate::db::ResultSink;
use crate::jobs::queue::JobQueue;
use crate::metrics::Metrics;
use crate::services::{FetchGateway, NotificationService};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a fetch task needs, shared by all dispatch workers.
///
/// - Gateway for the remote pool API
/// - Sink for persisting results
/// - Notifier for offline workers
/// - Queue for fanning out chart jobs
pub struct JobContext {
    pub gateway: Arc<dyn FetchGateway>,
    pub sink: Arc<dyn ResultSink>,
    pub notifier: Arc<dyn NotificationService>,
    pub queue: JobQueue,
    pub metrics: Option<Arc<Metrics>>,
    pub fetch_timeout: Duration,
    pub notify_failure: NotifyFailurePolicy,
    pub shutdown: CancellationToken,
}

impl JobContext {
    pub fn new(
        gateway: Arc<dyn FetchGateway>,
        sink: Arc<dyn ResultSink>,
        notifier: Arc<dyn NotificationService>,
        queue: JobQueue,
    ) -> Self {
        Self {
            gateway,
            sink,
            notifier,
            queue,
            metrics: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            notify_failure: NotifyFailurePolicy::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_notify_failure(mut self, policy: NotifyFailurePolicy) -> Self {
        self.notify_failure = policy;
        self
    }

    /// Token cancelled when a notification failure must stop the service.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}
