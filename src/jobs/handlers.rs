//! Job handlers: one remote fetch plus its persistence or fan-out

use crate::config::NotifyFailurePolicy;
use crate::error::{FetchError, JobError};
use crate::jobs::context::JobContext;
use crate::jobs::types::{Job, JobKind, JobReport};
use crate::services::Delivery;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Run the handler matching the job's kind.
pub async fn run_job(job: &Job, ctx: &JobContext) -> Result<JobReport, JobError> {
    match job.kind {
        JobKind::FetchWorkers => handle_fetch_workers(job, ctx).await,
        JobKind::FetchChart => handle_fetch_chart(job, ctx).await,
        JobKind::FetchBalance => handle_fetch_balance(job, ctx).await,
    }
}

/// Bound a gateway call by `deadline`. Elapsing drops the in-flight request.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(deadline)),
    }
}

/// List the address's workers, queue a chart job for each one and notify
/// the contacts of every offline worker.
pub async fn handle_fetch_workers(job: &Job, ctx: &JobContext) -> Result<JobReport, JobError> {
    debug!(pool = %job.pool_name, address = %job.address, "FetchWorkers: listing workers");

    let workers = with_deadline(ctx.fetch_timeout, ctx.gateway.list_workers(&job.address)).await?;

    let mut offline = 0;
    let mut notified = 0;
    for worker in &workers {
        debug!(
            pool = %job.pool_name,
            address = %job.address,
            worker = %worker.name,
            "FetchWorkers: queueing chart job for {}",
            worker.name
        );
        ctx.queue
            .submit(Job::fetch_chart(&job.pool_name, &job.address, &worker.name))
            .await
            .ok_or(JobError::QueueClosed)?;

        if worker.online {
            continue;
        }
        offline += 1;
        info!(
            worker = %worker.name,
            address = %job.address,
            "FetchWorkers: {} is offline",
            worker.name
        );

        match ctx.notifier.notify(&worker.name).await {
            Ok(Delivery::Sent(count)) => {
                notified += count;
                if let Some(ref metrics) = ctx.metrics {
                    metrics.notifications_sent_total.inc_by(count as u64);
                }
            }
            Ok(delivery) => {
                debug!(
                    worker = %worker.name,
                    delivery = ?delivery,
                    "FetchWorkers: no notification sent"
                );
            }
            Err(e) => {
                if let Some(ref metrics) = ctx.metrics {
                    metrics.notification_failures_total.inc();
                }
                match ctx.notify_failure {
                    NotifyFailurePolicy::Log => {
                        warn!(
                            worker = %worker.name,
                            error = %e,
                            "FetchWorkers: notification failed"
                        );
                    }
                    NotifyFailurePolicy::Shutdown => {
                        error!(
                            worker = %worker.name,
                            error = %e,
                            "FetchWorkers: notification failed, requesting shutdown"
                        );
                        ctx.shutdown.cancel();
                        return Err(e.into());
                    }
                }
            }
        }
    }

    Ok(JobReport::WorkersListed {
        discovered: workers.len(),
        offline,
        notified,
    })
}

pub async fn handle_fetch_chart(job: &Job, ctx: &JobContext) -> Result<JobReport, JobError> {
    debug!(
        pool = %job.pool_name,
        address = %job.address,
        worker = %job.worker_name,
        "FetchChart: fetching chart for {}",
        job.worker_name
    );

    let chart = with_deadline(
        ctx.fetch_timeout,
        ctx.gateway.get_chart(&job.address, &job.worker_name),
    )
    .await?;

    let points = ctx
        .sink
        .save_worker_chart(&job.pool_name, &job.address, &job.worker_name, &chart)
        .await?;
    Ok(JobReport::ChartSaved { points })
}

pub async fn handle_fetch_balance(job: &Job, ctx: &JobContext) -> Result<JobReport, JobError> {
    debug!(pool = %job.pool_name, address = %job.address, "FetchBalance: fetching balance");

    let balance = with_deadline(ctx.fetch_timeout, ctx.gateway.get_balance(&job.address)).await?;

    ctx.sink
        .save_balance(&job.pool_name, &job.address, balance)
        .await?;
    debug!(address = %job.address, balance = %balance, "FetchBalance: balance saved");
    Ok(JobReport::BalanceSaved { balance })
}
