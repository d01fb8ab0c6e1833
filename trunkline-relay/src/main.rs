use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use trunkline_relay::config::RelayConfig;
use trunkline_relay::connection_limit::ConnectionLimiter;
use trunkline_relay::exchange::Exchange;
use trunkline_relay::http::{create_router, HttpState};
use trunkline_relay::metrics::RelayMetrics;
use trunkline_relay::rate_limit::RateLimiter;

const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
const LIMITER_MAX_IDLE: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("trunkline_relay=info".parse().unwrap()),
        )
        .init();

    let config = RelayConfig::from_env();
    info!("Starting trunkline-relay v{}", env!("CARGO_PKG_VERSION"));

    let exchange = Exchange::new().into_shared();
    let metrics = RelayMetrics::new();
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_per_min));
    let connection_limiter = ConnectionLimiter::new(config.max_connections);

    // Health and metrics endpoints
    let http_state = Arc::new(HttpState {
        metrics: metrics.clone(),
        exchange: exchange.clone(),
        start_time: Instant::now(),
        metrics_token: config.metrics_token.clone(),
    });
    let http_addr = config.http_addr;
    tokio::spawn(async move {
        let router = create_router(http_state);
        match TcpListener::bind(http_addr).await {
            Ok(listener) => {
                info!("HTTP endpoints listening on {}", http_addr);
                if let Err(e) = axum::serve(listener, router).await {
                    error!("HTTP server error: {}", e);
                }
            }
            Err(e) => error!("Failed to bind HTTP address {}: {}", http_addr, e),
        }
    });

    // Retention sweep for stored conversations
    {
        let exchange = exchange.clone();
        let metrics = metrics.clone();
        let horizon = config.retention_horizon();
        let mut ticker = tokio::time::interval(config.sweep_interval());
        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let swept = exchange.lock().await.sweep_expired(horizon);
                if swept > 0 {
                    metrics.messages_swept.inc_by(swept as u64);
                }
            }
        });
    }

    // Unanswered calls time out as missed
    if let Some(timeout) = config.ring_timeout() {
        let exchange = exchange.clone();
        let metrics = metrics.clone();
        let mut ticker = tokio::time::interval(config.ring_sweep_interval());
        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let expired = exchange.lock().await.expire_stale_rings(timeout);
                if expired > 0 {
                    metrics.calls_timed_out.inc_by(expired as u64);
                }
            }
        });
    }

    // Idle rate-limit buckets are dropped to bound memory
    {
        let rate_limiter = rate_limiter.clone();
        let mut ticker = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let removed = rate_limiter.cleanup_inactive(LIMITER_MAX_IDLE);
                if removed > 0 {
                    debug!("Dropped {} idle rate-limit buckets", removed);
                }
            }
        });
    }

    let listener = match TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };
    info!("WebSocket relay listening on {}", config.listen_addr);

    trunkline_relay::serve(
        listener,
        exchange,
        rate_limiter,
        connection_limiter,
        metrics,
        config.max_message_size,
    )
    .await;
}
