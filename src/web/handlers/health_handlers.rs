use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use tracing::warn;

use crate::models::ErrorResponse;
use crate::services::AppState;

/// Liveness probe endpoint
/// Returns 200 OK if the service is running
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: the document store must answer a ping
pub async fn readiness(State(state): State<AppState>) -> Response {
    match state.services.backend().documents.ping().await {
        Ok(()) => Json(json!({
            "status": "ready",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "checks": {
                "document_store": "ok"
            }
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::with_details(
                    "Document store unavailable".to_string(),
                    e.to_string(),
                )),
            )
                .into_response()
        }
    }
}

/// Health check endpoint with detailed information
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}
