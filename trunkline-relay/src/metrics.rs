//! Prometheus Metrics
//!
//! Counters are incremented where the event happens; gauges are
//! snapshots refreshed from the exchange at scrape time. Each instance
//! owns its registry, so tests can build as many as they need.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct RelayMetrics {
    registry: Registry,

    pub connections_total: IntCounter,
    pub connections_active: IntGauge,
    pub connection_errors: IntCounter,

    pub events_total: IntCounter,
    pub protocol_errors: IntCounter,
    pub rate_limited: IntCounter,

    pub messages_relayed: IntCounter,
    pub calls_started: IntCounter,
    pub signaling_frames: IntCounter,

    pub messages_swept: IntCounter,
    pub calls_timed_out: IntCounter,

    pub registered_users: IntGauge,
    pub online_users: IntGauge,
    pub stored_messages: IntGauge,
    pub queued_messages: IntGauge,
    pub active_calls: IntGauge,
}

fn int_counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid metric name");
    registry
        .register(Box::new(counter.clone()))
        .expect("metric registration");
    counter
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("valid metric name");
    registry
        .register(Box::new(gauge.clone()))
        .expect("metric registration");
    gauge
}

impl RelayMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let connections_total = int_counter(
            &registry,
            "relay_connections_total",
            "Total WebSocket connections accepted",
        );
        let connections_active = int_gauge(
            &registry,
            "relay_connections_active",
            "Currently open WebSocket connections",
        );
        let connection_errors = int_counter(
            &registry,
            "relay_connection_errors_total",
            "Connections rejected or failed during handshake",
        );
        let events_total = int_counter(
            &registry,
            "relay_events_total",
            "Client events dispatched to the exchange",
        );
        let protocol_errors = int_counter(
            &registry,
            "relay_protocol_errors_total",
            "Frames that failed to parse as protocol events",
        );
        let rate_limited = int_counter(
            &registry,
            "relay_rate_limited_total",
            "Frames dropped by the rate limiter",
        );
        let messages_relayed = int_counter(
            &registry,
            "relay_messages_relayed_total",
            "Text and voice message sends processed",
        );
        let calls_started = int_counter(
            &registry,
            "relay_calls_started_total",
            "Call dial events processed",
        );
        let signaling_frames = int_counter(
            &registry,
            "relay_signaling_frames_total",
            "WebRTC signaling frames relayed between phones",
        );
        let messages_swept = int_counter(
            &registry,
            "relay_messages_swept_total",
            "Messages removed by the retention sweep",
        );
        let calls_timed_out = int_counter(
            &registry,
            "relay_calls_timed_out_total",
            "Ringing calls expired by the ring timeout",
        );
        let registered_users = int_gauge(
            &registry,
            "relay_registered_users",
            "Identities known to the registry",
        );
        let online_users = int_gauge(
            &registry,
            "relay_online_users",
            "Identities with a live connection",
        );
        let stored_messages = int_gauge(
            &registry,
            "relay_stored_messages",
            "Messages currently held in conversation logs",
        );
        let queued_messages = int_gauge(
            &registry,
            "relay_queued_messages",
            "Messages queued for offline receivers",
        );
        let active_calls = int_gauge(
            &registry,
            "relay_active_calls",
            "Call sessions in calling or ongoing state",
        );

        RelayMetrics {
            registry,
            connections_total,
            connections_active,
            connection_errors,
            events_total,
            protocol_errors,
            rate_limited,
            messages_relayed,
            calls_started,
            signaling_frames,
            messages_swept,
            calls_timed_out,
            registered_users,
            online_users,
            stored_messages,
            queued_messages,
            active_calls,
        }
    }

    /// Renders the registry in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}
