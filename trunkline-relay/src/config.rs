//! Relay Configuration
//!
//! All settings come from `TRUNKLINE_*` environment variables with
//! defaults suitable for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration for the relay server.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// WebSocket listen address.
    pub listen_addr: SocketAddr,
    /// HTTP listen address for health and metrics endpoints.
    pub http_addr: SocketAddr,
    /// Maximum accepted frame size in bytes.
    pub max_message_size: usize,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Per-client event budget per minute.
    pub rate_limit_per_min: u32,
    /// Age at which conversation entries are swept, in seconds.
    pub retention_horizon_secs: u64,
    /// How often the retention sweep runs, in seconds.
    pub sweep_interval_secs: u64,
    /// How long a call may ring before it counts as missed, in
    /// seconds. Zero disables the timeout entirely.
    pub ring_timeout_secs: u64,
    /// How often ringing calls are checked against the timeout.
    pub ring_sweep_interval_secs: u64,
    /// Optional bearer token protecting the metrics endpoint.
    pub metrics_token: Option<String>,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9470)),
            http_addr: SocketAddr::from(([127, 0, 0, 1], 9471)),
            max_message_size: 1024 * 1024,
            max_connections: 1024,
            rate_limit_per_min: 600,
            retention_horizon_secs: 24 * 60 * 60,
            sweep_interval_secs: 60 * 60,
            ring_timeout_secs: 60,
            ring_sweep_interval_secs: 5,
            metrics_token: None,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from the environment.
    pub fn from_env() -> Self {
        let defaults = RelayConfig::default();
        RelayConfig {
            listen_addr: env_parse("TRUNKLINE_LISTEN_ADDR", defaults.listen_addr),
            http_addr: env_parse("TRUNKLINE_HTTP_ADDR", defaults.http_addr),
            max_message_size: env_parse("TRUNKLINE_MAX_MESSAGE_SIZE", defaults.max_message_size),
            max_connections: env_parse("TRUNKLINE_MAX_CONNECTIONS", defaults.max_connections),
            rate_limit_per_min: env_parse("TRUNKLINE_RATE_LIMIT_PER_MIN", defaults.rate_limit_per_min),
            retention_horizon_secs: env_parse(
                "TRUNKLINE_RETENTION_HORIZON_SECS",
                defaults.retention_horizon_secs,
            ),
            sweep_interval_secs: env_parse(
                "TRUNKLINE_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            ),
            ring_timeout_secs: env_parse("TRUNKLINE_RING_TIMEOUT_SECS", defaults.ring_timeout_secs),
            ring_sweep_interval_secs: env_parse(
                "TRUNKLINE_RING_SWEEP_INTERVAL_SECS",
                defaults.ring_sweep_interval_secs,
            ),
            metrics_token: std::env::var("TRUNKLINE_METRICS_TOKEN").ok(),
        }
    }

    pub fn retention_horizon(&self) -> Duration {
        Duration::from_secs(self.retention_horizon_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Ring timeout, or `None` when disabled.
    pub fn ring_timeout(&self) -> Option<Duration> {
        if self.ring_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.ring_timeout_secs))
        }
    }

    pub fn ring_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.ring_sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.listen_addr.port(), 9470);
        assert_eq!(config.http_addr.port(), 9471);
        assert_eq!(config.retention_horizon(), Duration::from_secs(86_400));
        assert_eq!(config.sweep_interval(), Duration::from_secs(3_600));
        assert_eq!(config.ring_timeout(), Some(Duration::from_secs(60)));
        assert!(config.metrics_token.is_none());
    }

    #[test]
    fn test_zero_ring_timeout_disables_sweep() {
        let config = RelayConfig {
            ring_timeout_secs: 0,
            ..RelayConfig::default()
        };
        assert_eq!(config.ring_timeout(), None);
    }
}
