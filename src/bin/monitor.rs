//! Fairshares Monitor
//!
//! Polls Flexpool for worker status, charts and balances on fixed intervals,
//! stores them in SQLite and emails contacts when a worker goes offline.

use dotenvy::dotenv;
use fairshares::config::{self, Config};
use fairshares::core::http::{start_server, AppState};
use fairshares::core::{
    spawn_observers, DispatchConfig, JobScheduler, OutcomeTotals, TickerKind, WorkerPool,
};
use fairshares::db::{AddressDirectory, Registration, ResultSink, SqliteStore};
use fairshares::jobs::{JobContext, JobQueue};
use fairshares::logging;
use fairshares::metrics::Metrics;
use fairshares::services::{FetchGateway, FlexpoolClient, MailjetNotifier, NotificationService};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let config_path = config::get_config_path();
    let config = Config::load(&config_path)?;
    let env = config::get_environment();
    info!("Starting Fairshares Monitor");
    info!(environment = %env, config = %config_path, "Environment");
    info!(address = %config.flexpool.address, "Configured address {}", config.flexpool.address);

    let metrics = Arc::new(Metrics::new()?);

    info!(database = %config.database, "Opening database...");
    let store = Arc::new(SqliteStore::open(&config.database).await?);
    let version = store.migrate().await?;
    info!(version = version, "Database version: {}", version);

    let pools = config.tracked_pools();
    for pool_name in &pools {
        match store.register_address(&config.flexpool.address, pool_name).await? {
            Registration::Added => {
                info!(address = %config.flexpool.address, pool = %pool_name, "Registered address")
            }
            Registration::AlreadyExists => {
                info!(address = %config.flexpool.address, "Address already registered")
            }
        }
    }

    let shutdown = CancellationToken::new();
    let scheduler_config = &config.scheduler;

    let (queue, receiver) = JobQueue::new(scheduler_config.queue_capacity);
    let queue = queue.with_metrics(metrics.clone());

    let gateway: Arc<dyn FetchGateway> =
        Arc::new(FlexpoolClient::new(&config.flexpool.endpoint, &config.flexpool.coin));
    let notifier: Arc<dyn NotificationService> = Arc::new(MailjetNotifier::new(&config));
    if !config.mailjet.is_configured() {
        warn!("Mailjet credentials missing - offline notifications will only be logged");
    }
    let sink: Arc<dyn ResultSink> = store.clone();
    let directory: Arc<dyn AddressDirectory> = store.clone();

    let job_context = Arc::new(
        JobContext::new(gateway, sink, notifier, queue.clone())
            .with_metrics(metrics.clone())
            .with_fetch_timeout(scheduler_config.fetch_timeout())
            .with_notify_failure(scheduler_config.notify_failure)
            .with_shutdown(shutdown.clone()),
    );

    // Outcomes flow from fetch tasks to the observers
    let totals = Arc::new(OutcomeTotals::default());
    let (results_tx, results_rx) = mpsc::channel(scheduler_config.result_capacity);
    let observer_handles = spawn_observers(
        scheduler_config.worker_pool_size,
        results_rx,
        totals.clone(),
        Some(metrics.clone()),
    );

    let worker_handles = WorkerPool::new(
        DispatchConfig::from(scheduler_config),
        job_context,
        receiver,
        results_tx,
    )
    .with_shutdown(shutdown.clone())
    .start();

    let worker_ticker = JobScheduler::new(
        TickerKind::Workers,
        directory.clone(),
        queue.clone(),
        pools.clone(),
        scheduler_config.worker_interval(),
    )?
    .with_metrics(metrics.clone())
    .with_shutdown(shutdown.clone());
    let balance_ticker = JobScheduler::new(
        TickerKind::Balance,
        directory,
        queue,
        pools,
        scheduler_config.balance_interval(),
    )?
    .with_metrics(metrics.clone())
    .with_shutdown(shutdown.clone());
    worker_ticker.start().await;
    balance_ticker.start().await;

    let server_handle = config.http.port.map(|port| {
        let state = AppState::new(metrics.clone(), totals.clone());
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state, server_shutdown).await {
                error!(error = %e, "Status server error");
            }
        })
    });

    info!("Monitor started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => info!("Shutting down monitor..."),
        _ = shutdown.cancelled() => warn!("Shutdown requested internally, stopping monitor..."),
    }
    shutdown.cancel();

    worker_ticker.stop().await;
    balance_ticker.stop().await;
    for handle in worker_handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Dispatch worker ended abnormally");
        }
    }
    // Workers and tickers are gone, so the outcome channel closes and observers finish
    for handle in observer_handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Result observer ended abnormally");
        }
    }
    if let Some(handle) = server_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "Status server task ended abnormally");
        }
    }
    store.close().await;

    let summary = totals.snapshot();
    info!(
        completed = summary.completed,
        failed = summary.failed,
        timed_out = summary.timed_out,
        aborted = summary.aborted,
        "Monitor stopped"
    );
    Ok(())
}
