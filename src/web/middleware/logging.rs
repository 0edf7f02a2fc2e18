use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use std::{net::SocketAddr, time::Instant};
use tracing::{error, info, warn, Instrument};

use super::request_id::CorrelationId;
use crate::utils::client_ip;

/// Middleware for logging HTTP requests and responses.
/// The peer address is optional so the router also works without
/// `into_make_service_with_connect_info` (tests).
pub async fn logging_middleware(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let correlation_id = request
        .extensions()
        .get::<CorrelationId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "-".to_string());

    let client = client_ip(request.headers(), connect_info.map(|ConnectInfo(addr)| addr));

    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id,
        method = %method,
        uri = %uri,
        client_ip = %client,
        user_agent = %user_agent,
    );

    async move {
        let response = next.run(request).await;

        let duration_ms = start_time.elapsed().as_millis();
        let status = response.status().as_u16();

        match status {
            500..=599 => error!(status, duration_ms, "Request completed with server error"),
            400..=499 => warn!(status, duration_ms, "Request completed with client error"),
            300..=399 => info!(status, duration_ms, "Request completed with redirect"),
            _ => info!(status, duration_ms, "Request completed"),
        }

        response
    }
    .instrument(span)
    .await
}
