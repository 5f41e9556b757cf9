//! Unit tests for the interval tickers

use crate::mocks::StaticDirectory;
use fairshares::core::{JobScheduler, TickerKind};
use fairshares::error::JobError;
use fairshares::jobs::{JobKind, JobQueue};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_zero_period_is_rejected() {
    let (queue, _receiver) = JobQueue::new(1);
    let result = JobScheduler::new(
        TickerKind::Workers,
        Arc::new(StaticDirectory::new()),
        queue,
        vec!["flexpool".into()],
        Duration::ZERO,
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_tick_enqueues_one_job_per_address() {
    let directory = StaticDirectory::new().with_pool("flexpool", &["0xA", "0xB", "0xC"]);
    let (queue, receiver) = JobQueue::new(8);
    let ticker = JobScheduler::new(
        TickerKind::Workers,
        Arc::new(directory),
        queue,
        vec!["flexpool".into()],
        Duration::from_secs(60),
    )
    .unwrap();

    assert_eq!(ticker.run_tick().await.unwrap(), 3);

    let mut addresses = Vec::new();
    while let Some(job) = receiver.try_recv().await {
        assert_eq!(job.kind, JobKind::FetchWorkers);
        assert_eq!(job.pool_name, "flexpool");
        addresses.push(job.address);
    }
    assert_eq!(addresses, vec!["0xA", "0xB", "0xC"]);
}

#[tokio::test]
async fn test_balance_ticker_emits_balance_jobs() {
    let directory = StaticDirectory::new().with_pool("flexpool", &["0xA"]);
    let (queue, receiver) = JobQueue::new(1);
    let ticker = JobScheduler::new(
        TickerKind::Balance,
        Arc::new(directory),
        queue,
        vec!["flexpool".into()],
        Duration::from_secs(60),
    )
    .unwrap();

    assert_eq!(ticker.kind(), TickerKind::Balance);
    ticker.run_tick().await.unwrap();
    let job = receiver.recv().await.unwrap();
    assert_eq!(job.kind, JobKind::FetchBalance);
    assert_eq!(job.worker_name, "");
}

#[tokio::test]
async fn test_directory_error_skips_pool() {
    let directory = Arc::new(
        StaticDirectory::new()
            .with_pool("other", &["0xB"])
            .failing("flexpool"),
    );
    let (queue, receiver) = JobQueue::new(4);
    let ticker = JobScheduler::new(
        TickerKind::Workers,
        directory.clone(),
        queue,
        vec!["flexpool".into(), "other".into()],
        Duration::from_secs(60),
    )
    .unwrap();

    // The failing pool yields nothing, the next pool is still enumerated
    assert_eq!(ticker.run_tick().await.unwrap(), 1);
    assert_eq!(receiver.recv().await.unwrap().address, "0xB");
    assert_eq!(
        *directory.calls.lock().unwrap(),
        vec!["flexpool".to_string(), "other".to_string()]
    );
}

#[tokio::test]
async fn test_closed_queue_ends_tick() {
    let directory = StaticDirectory::new().with_pool("flexpool", &["0xA"]);
    let (queue, receiver) = JobQueue::new(1);
    drop(receiver);
    let ticker = JobScheduler::new(
        TickerKind::Workers,
        Arc::new(directory),
        queue,
        vec!["flexpool".into()],
        Duration::from_secs(60),
    )
    .unwrap();

    assert!(matches!(ticker.run_tick().await, Err(JobError::QueueClosed)));
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_fires_after_one_period() {
    let directory = StaticDirectory::new().with_pool("flexpool", &["0xA"]);
    let (queue, receiver) = JobQueue::new(4);
    let ticker = JobScheduler::new(
        TickerKind::Workers,
        Arc::new(directory),
        queue,
        vec!["flexpool".into()],
        Duration::from_secs(60),
    )
    .unwrap();

    let started = tokio::time::Instant::now();
    ticker.start().await;
    assert!(ticker.is_running().await);

    let job = receiver.recv().await.expect("tick produced a job");
    assert_eq!(job.address, "0xA");
    assert!(started.elapsed() >= Duration::from_secs(60));

    let second = receiver.recv().await.unwrap();
    assert_eq!(second.address, "0xA");
    assert!(started.elapsed() >= Duration::from_secs(120));

    ticker.stop().await;
    tokio::task::yield_now().await;
    assert!(!ticker.is_running().await);
}

#[tokio::test(start_paused = true)]
async fn test_directory_errors_do_not_stop_the_loop() {
    let directory = Arc::new(StaticDirectory::new().failing("flexpool"));
    let (queue, _receiver) = JobQueue::new(1);
    let ticker = JobScheduler::new(
        TickerKind::Balance,
        directory.clone(),
        queue,
        vec!["flexpool".into()],
        Duration::from_secs(10),
    )
    .unwrap();

    ticker.start().await;
    tokio::time::sleep(Duration::from_secs(35)).await;

    assert_eq!(directory.calls.lock().unwrap().len(), 3);
    assert!(ticker.is_running().await);
    ticker.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_token_stops_the_loop() {
    let shutdown = tokio_util::sync::CancellationToken::new();
    let (queue, _receiver) = JobQueue::new(1);
    let ticker = JobScheduler::new(
        TickerKind::Workers,
        Arc::new(StaticDirectory::new()),
        queue,
        vec!["flexpool".into()],
        Duration::from_secs(10),
    )
    .unwrap()
    .with_shutdown(shutdown.clone());

    ticker.start().await;
    shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!ticker.is_running().await);
}

#[tokio::test(start_paused = true)]
async fn test_late_ticks_are_delivered_in_a_burst() {
    let directory = Arc::new(StaticDirectory::new().with_pool("flexpool", &["0xA", "0xB"]));
    let (queue, receiver) = JobQueue::new(1);
    let ticker = JobScheduler::new(
        TickerKind::Workers,
        directory.clone(),
        queue,
        vec!["flexpool".into()],
        Duration::from_secs(10),
    )
    .unwrap();

    let started = tokio::time::Instant::now();
    ticker.start().await;
    // Ticks at 10s, 20s, 30s and 40s fall due while nobody consumes
    tokio::time::sleep(Duration::from_secs(45)).await;

    // Every owed tick fires right away, before the 50s tick would be due
    let deadline = started + Duration::from_secs(49);
    let mut addresses = Vec::new();
    for _ in 0..8 {
        let job = tokio::time::timeout_at(deadline, receiver.recv())
            .await
            .expect("owed tick delivered late, not skipped")
            .unwrap();
        addresses.push(job.address);
    }

    assert_eq!(addresses, ["0xA", "0xB"].repeat(4));
    assert_eq!(directory.calls.lock().unwrap().len(), 4);
    ticker.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_second_start_keeps_a_single_loop() {
    let directory = StaticDirectory::new().with_pool("flexpool", &["0xA"]);
    let (queue, receiver) = JobQueue::new(8);
    let ticker = JobScheduler::new(
        TickerKind::Workers,
        Arc::new(directory),
        queue,
        vec!["flexpool".into()],
        Duration::from_secs(10),
    )
    .unwrap();

    ticker.start().await;
    ticker.start().await;
    assert!(ticker.is_running().await);

    tokio::time::sleep(Duration::from_secs(11)).await;
    ticker.stop().await;
    assert!(!ticker.is_running().await);
    tokio::time::sleep(Duration::from_secs(20)).await;

    let mut jobs = 0;
    while receiver.try_recv().await.is_some() {
        jobs += 1;
    }
    assert_eq!(jobs, 1, "only one loop ever ticked");
}
