use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::services::AppState;

/// Metrics middleware to track HTTP request metrics
pub async fn metrics_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let metrics = &state.metrics;

    metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    metrics.http_requests_in_flight.dec();

    metrics.record_request(start_time.elapsed().as_secs_f64());

    response
}
