//! Status server: liveness with outcome totals, plus Prometheus scraping

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

use crate::core::observer::{OutcomeTotals, TotalsSnapshot};
use crate::metrics::Metrics;

pub const SERVICE_NAME: &str = "fairshares-monitor";

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub totals: Arc<OutcomeTotals>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(metrics: Arc<Metrics>, totals: Arc<OutcomeTotals>) -> Self {
        Self {
            metrics,
            totals,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub uptime_seconds: u64,
    pub fetches_in_flight: i64,
    pub outcomes: TotalsSnapshot,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy",
        service: SERVICE_NAME,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        fetches_in_flight: state.metrics.fetch_tasks_in_flight.get(),
        outcomes: state.totals.snapshot(),
    })
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.export().map_err(|e| {
        warn!(error = %e, "Status server: failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let path = request.uri().path().to_string();
    let metrics = &state.metrics;

    metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    metrics.http_requests_in_flight.dec();

    let elapsed = started.elapsed();
    metrics.http_requests_total.inc();
    metrics
        .http_request_duration_seconds
        .observe(elapsed.as_secs_f64());

    if response.status().is_server_error() {
        warn!(
            path = %path,
            status = %response.status(),
            duration_ms = elapsed.as_millis() as u64,
            "Status server: request failed"
        );
    }
    response
}

pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(trace_layer)
                .layer(middleware::from_fn_with_state(state.clone(), track_requests)),
        )
        .with_state(state)
}

/// Serve the status endpoints until `shutdown` is cancelled.
pub async fn start_server(
    port: u16,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port = port, "Status server listening on port {}", port);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Status server stopped");
    Ok(())
}
