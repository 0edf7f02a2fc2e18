use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};

use crate::services::AppState;

/// Metrics endpoint for Prometheus scraping
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state
        .metrics
        .update_uptime(state.started_at.elapsed().as_secs_f64());

    (
        [
            (header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        state.metrics.gather(),
    )
}
