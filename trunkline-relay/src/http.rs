//! HTTP Admin Surface
//!
//! Health, readiness, and Prometheus metrics alongside the WebSocket
//! port. The metrics route checks a bearer token when one is
//! configured; health and readiness stay open for probes.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::exchange::SharedExchange;
use crate::metrics::RelayMetrics;

pub struct HttpState {
    pub metrics: RelayMetrics,
    pub exchange: SharedExchange,
    pub start_time: Instant,
    pub metrics_token: Option<String>,
}

pub fn create_router(state: Arc<HttpState>) -> Router {
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_auth_middleware,
        ));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .merge(metrics_routes)
        .with_state(state)
}

async fn metrics_auth_middleware(
    State(state): State<Arc<HttpState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.metrics_token {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value == format!("Bearer {}", expected))
            .unwrap_or(false);
        if !authorized {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    next.run(request).await
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "trunkline-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn ready_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let exchange = state.exchange.lock().await;
    Json(json!({
        "status": "ready",
        "registered_users": exchange.user_count(),
        "online_users": exchange.online_count(),
    }))
}

/// Refreshes the engine gauges at scrape time, then renders the
/// registry in the Prometheus text format.
async fn metrics_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    {
        let exchange = state.exchange.lock().await;
        state
            .metrics
            .registered_users
            .set(exchange.user_count() as i64);
        state.metrics.online_users.set(exchange.online_count() as i64);
        state
            .metrics
            .stored_messages
            .set(exchange.message_count() as i64);
        state
            .metrics
            .queued_messages
            .set(exchange.queued_count() as i64);
        state
            .metrics
            .active_calls
            .set(exchange.active_call_count() as i64);
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.encode(),
    )
}
