//! Prometheus metrics for the dispatch engine and the status server.

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub jobs_submitted_total: IntCounterVec,
    pub jobs_dispatched_total: IntCounterVec,
    pub job_outcomes_total: IntCounterVec,
    pub fetch_duration_seconds: HistogramVec,
    pub fetch_tasks_in_flight: IntGauge,
    pub enumeration_failures_total: IntCounter,
    pub notifications_sent_total: IntCounter,
    pub notification_failures_total: IntCounter,
    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let jobs_submitted_total = IntCounterVec::new(
            Opts::new("jobs_submitted_total", "Jobs submitted to the job queue"),
            &["kind"],
        )?;
        let jobs_dispatched_total = IntCounterVec::new(
            Opts::new("jobs_dispatched_total", "Jobs dequeued by dispatch workers"),
            &["kind"],
        )?;
        let job_outcomes_total = IntCounterVec::new(
            Opts::new("job_outcomes_total", "Observed job outcomes"),
            &["kind", "status"],
        )?;
        let fetch_duration_seconds = HistogramVec::new(
            HistogramOpts::new("fetch_duration_seconds", "Time spent running a fetch task")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["kind"],
        )?;
        let fetch_tasks_in_flight =
            IntGauge::new("fetch_tasks_in_flight", "Fetch tasks currently running")?;
        let enumeration_failures_total = IntCounter::new(
            "enumeration_failures_total",
            "Ticks where a pool's addresses could not be listed",
        )?;
        let notifications_sent_total =
            IntCounter::new("notifications_sent_total", "Offline notifications delivered")?;
        let notification_failures_total = IntCounter::new(
            "notification_failures_total",
            "Offline notifications that failed to send",
        )?;
        let http_requests_total =
            IntCounter::new("http_requests_total", "HTTP requests served by the status server")?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests being served")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency",
        ))?;

        registry.register(Box::new(jobs_submitted_total.clone()))?;
        registry.register(Box::new(jobs_dispatched_total.clone()))?;
        registry.register(Box::new(job_outcomes_total.clone()))?;
        registry.register(Box::new(fetch_duration_seconds.clone()))?;
        registry.register(Box::new(fetch_tasks_in_flight.clone()))?;
        registry.register(Box::new(enumeration_failures_total.clone()))?;
        registry.register(Box::new(notifications_sent_total.clone()))?;
        registry.register(Box::new(notification_failures_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            jobs_submitted_total,
            jobs_dispatched_total,
            job_outcomes_total,
            fetch_duration_seconds,
            fetch_tasks_in_flight,
            enumeration_failures_total,
            notifications_sent_total,
            notification_failures_total,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
