//! Tickers, queue, dispatch workers and observers wired together

use crate::mocks::{GatewayCall, MockGateway, RecordingNotifier, StaticDirectory};
use fairshares::core::{
    spawn_observers, DispatchConfig, JobScheduler, OutcomeTotals, TickerKind, WorkerPool,
};
use fairshares::db::{AddressDirectory, ResultSink, SqliteStore};
use fairshares::jobs::{JobContext, JobQueue};
use fairshares::metrics::Metrics;
use fairshares::models::WorkerStatus;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_millis(100);

/// Poll `check` until it holds or five seconds pass.
async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

struct Monitor {
    shutdown: CancellationToken,
    tickers: Vec<JobScheduler>,
    workers: Vec<JoinHandle<()>>,
    observers: Vec<JoinHandle<()>>,
    totals: Arc<OutcomeTotals>,
    metrics: Arc<Metrics>,
}

impl Monitor {
    async fn start(
        directory: Arc<dyn AddressDirectory>,
        sink: Arc<dyn ResultSink>,
        gateway: Arc<MockGateway>,
        notifier: Arc<RecordingNotifier>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let metrics = Arc::new(Metrics::new().unwrap());
        let (queue, receiver) = JobQueue::new(1);
        let queue = queue.with_metrics(metrics.clone());

        let ctx = Arc::new(
            JobContext::new(gateway, sink, notifier, queue.clone())
                .with_metrics(metrics.clone())
                .with_fetch_timeout(Duration::from_secs(2))
                .with_shutdown(shutdown.clone()),
        );

        let totals = Arc::new(OutcomeTotals::default());
        let (tx, rx) = mpsc::channel(64);
        let observers = spawn_observers(2, rx, totals.clone(), Some(metrics.clone()));

        let config = DispatchConfig {
            pool_size: 2,
            pacing: Duration::from_millis(10),
            drain_grace: Duration::from_millis(500),
        };
        let workers = WorkerPool::new(config, ctx, receiver, tx)
            .with_shutdown(shutdown.clone())
            .start();

        let mut tickers = Vec::new();
        for kind in [TickerKind::Workers, TickerKind::Balance] {
            let ticker = JobScheduler::new(
                kind,
                directory.clone(),
                queue.clone(),
                vec!["flexpool".to_string()],
                TICK,
            )
            .unwrap()
            .with_metrics(metrics.clone())
            .with_shutdown(shutdown.clone());
            ticker.start().await;
            tickers.push(ticker);
        }

        Self {
            shutdown,
            tickers,
            workers,
            observers,
            totals,
            metrics,
        }
    }

    async fn stop(self) -> Arc<OutcomeTotals> {
        self.shutdown.cancel();
        for ticker in &self.tickers {
            ticker.stop().await;
        }
        for handle in self.workers {
            handle.await.unwrap();
        }
        // Outcome senders live only in the workers, so observers end now
        for handle in self.observers {
            handle.await.unwrap();
        }
        self.totals
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_offline_worker_is_charted_and_reported() {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    store.migrate().await.unwrap();
    store.register_address("0xABC", "flexpool").await.unwrap();

    let gateway = Arc::new(
        MockGateway::new()
            .with_workers(vec![WorkerStatus::new("rig1", false)])
            .with_balance(1_000),
    );
    let notifier = Arc::new(RecordingNotifier::new());

    let monitor = Monitor::start(
        store.clone(),
        store.clone(),
        gateway.clone(),
        notifier.clone(),
    )
    .await;

    let done = wait_for(|| {
        let store = store.clone();
        let notifier = notifier.clone();
        async move {
            let charted = store
                .count_chart_points("flexpool", "0xABC", "rig1")
                .await
                .unwrap_or(0)
                == 3;
            let balance = matches!(
                store.latest_balance("flexpool", "0xABC").await,
                Ok(Some(ref record)) if record.balance == 1_000
            );
            charted && balance && notifier.calls().iter().any(|w| w == "rig1")
        }
    })
    .await;
    assert!(done, "chart, balance and notification recorded");

    let metrics = monitor.metrics.clone();
    let totals = monitor.stop().await;

    let calls = gateway.calls();
    assert!(calls.contains(&GatewayCall::ListWorkers("0xABC".into())));
    assert!(calls.contains(&GatewayCall::GetChart("0xABC".into(), "rig1".into())));
    assert!(calls.contains(&GatewayCall::GetBalance("0xABC".into())));

    let snapshot = totals.snapshot();
    assert!(snapshot.completed >= 3);
    assert_eq!(snapshot.failed, 0);
    assert_eq!(snapshot.timed_out, 0);
    assert!(metrics.notifications_sent_total.get() >= 1);
    assert_eq!(metrics.fetch_tasks_in_flight.get(), 0);
    store.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_directory_failure_produces_no_jobs() {
    let directory = Arc::new(StaticDirectory::new().failing("flexpool"));
    let sink = Arc::new(crate::mocks::RecordingSink::new());
    let gateway = Arc::new(MockGateway::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let monitor = Monitor::start(directory.clone(), sink.clone(), gateway.clone(), notifier).await;

    let retried = wait_for(|| {
        let directory = directory.clone();
        async move { directory.calls.lock().unwrap().len() >= 4 }
    })
    .await;
    assert!(retried, "tickers keep running after enumeration errors");
    for ticker in &monitor.tickers {
        assert!(ticker.is_running().await);
    }

    let metrics = monitor.metrics.clone();
    let totals = monitor.stop().await;

    assert!(gateway.calls().is_empty());
    assert!(sink.charts().is_empty());
    assert_eq!(totals.snapshot().total(), 0);
    assert!(metrics.enumeration_failures_total.get() >= 4);
}
