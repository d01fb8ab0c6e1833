//! Trunkline Relay
//!
//! WebSocket relay for direct messages, presence, and call signaling
//! between phone-number-keyed clients. All state lives in memory; the
//! process is the source of truth for exactly as long as it runs.

pub mod config;
pub mod connection_limit;
pub mod exchange;
pub mod handler;
pub mod http;
pub mod metrics;
pub mod rate_limit;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::warn;

use crate::connection_limit::ConnectionLimiter;
use crate::exchange::SharedExchange;
use crate::metrics::RelayMetrics;
use crate::rate_limit::RateLimiter;

/// Accepts WebSocket connections forever, spawning one handler task
/// per socket. Connections over the limit are dropped before the
/// handshake.
pub async fn serve(
    listener: TcpListener,
    exchange: SharedExchange,
    rate_limiter: Arc<RateLimiter>,
    connection_limiter: ConnectionLimiter,
    metrics: RelayMetrics,
    max_message_size: usize,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                metrics.connections_total.inc();
                let Some(guard) = connection_limiter.try_acquire() else {
                    metrics.connection_errors.inc();
                    warn!("Connection limit reached, rejecting {}", addr);
                    drop(stream);
                    continue;
                };
                metrics.connections_active.inc();
                tokio::spawn(handler::handle_connection(
                    stream,
                    addr,
                    exchange.clone(),
                    rate_limiter.clone(),
                    metrics.clone(),
                    max_message_size,
                    guard,
                ));
            }
            Err(e) => warn!("Failed to accept connection: {}", e),
        }
    }
}
