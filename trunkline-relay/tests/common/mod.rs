//! Shared harness for relay integration tests: an in-process relay on
//! an ephemeral port plus a thin WebSocket client.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use trunkline_core::{ClientEvent, ServerEvent};
use trunkline_relay::connection_limit::ConnectionLimiter;
use trunkline_relay::exchange::Exchange;
use trunkline_relay::metrics::RelayMetrics;
use trunkline_relay::rate_limit::RateLimiter;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);
pub const SILENCE_WINDOW: Duration = Duration::from_millis(200);

/// Starts a relay with test-friendly limits and returns its address.
pub async fn spawn_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind relay");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(trunkline_relay::serve(
        listener,
        Exchange::new().into_shared(),
        Arc::new(RateLimiter::new(6_000)),
        ConnectionLimiter::new(64),
        RelayMetrics::default(),
        1024 * 1024,
    ));
    addr
}

pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = connect_async(format!("ws://{}", addr))
            .await
            .expect("connect to relay");
        TestClient { ws }
    }

    /// Connects and registers, consuming the `registrationSuccess` ack.
    pub async fn register(addr: SocketAddr, name: &str, phone: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client
            .send(&ClientEvent::Register {
                id: None,
                name: name.to_string(),
                phone: phone.to_string(),
            })
            .await;
        match client.recv().await {
            ServerEvent::RegistrationSuccess { .. } => {}
            other => panic!("expected registrationSuccess, got {other:?}"),
        }
        client
    }

    pub async fn send(&mut self, event: &ClientEvent) {
        let json = serde_json::to_string(event).expect("serialize event");
        self.send_raw(json).await;
    }

    pub async fn send_raw(&mut self, text: String) {
        self.ws
            .send(WsMessage::Text(text))
            .await
            .expect("send frame");
    }

    /// Next decoded server event, skipping control frames.
    pub async fn recv(&mut self) -> ServerEvent {
        loop {
            let frame = timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for an event")
                .expect("connection closed")
                .expect("read error");
            if let WsMessage::Text(text) = frame {
                return serde_json::from_str(&text).expect("decode server event");
            }
        }
    }

    /// Asserts no event arrives within the silence window.
    pub async fn expect_silence(&mut self) {
        match timeout(SILENCE_WINDOW, self.ws.next()).await {
            Err(_) => {}
            Ok(Some(Ok(WsMessage::Text(text)))) => panic!("unexpected event: {text}"),
            Ok(_) => {}
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
