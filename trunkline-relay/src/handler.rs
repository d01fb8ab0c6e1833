//! WebSocket Connection Handler
//!
//! One task per connection. The task owns the socket and a mailbox
//! receiver; engine calls go through the shared exchange lock and
//! never suspend while holding it. Inbound frames pass a size check,
//! the rate limiter, and JSON decoding before they reach the engine.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use trunkline_core::{ClientEvent, RelayError, ServerEvent};

use crate::connection_limit::ConnectionGuard;
use crate::exchange::{Exchange, Mailbox, SharedExchange};
use crate::metrics::RelayMetrics;
use crate::rate_limit::RateLimiter;

pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    exchange: SharedExchange,
    rate_limiter: Arc<RateLimiter>,
    metrics: RelayMetrics,
    max_message_size: usize,
    _guard: ConnectionGuard,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            metrics.connection_errors.inc();
            metrics.connections_active.dec();
            warn!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };
    info!("Connection established: {}", addr);

    let (mut write, mut read) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Phone and connection id once `register` succeeds
    let mut registered: Option<(String, u64)> = None;

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                // The handler holds its own sender, so this channel
                // only closes when the task does
                let Some(event) = outbound else { break };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if write.send(WsMessage::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => error!("Failed to serialize event: {}", e),
                }
            }
            inbound = read.next() => {
                let Some(frame) = inbound else { break };
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!("Read error from {}: {}", addr, e);
                        break;
                    }
                };
                match frame {
                    WsMessage::Text(text) => {
                        metrics.events_total.inc();
                        if text.len() > max_message_size {
                            metrics.protocol_errors.inc();
                            warn!("Oversized frame ({} bytes) from {}", text.len(), addr);
                            continue;
                        }
                        let limit_key = registered
                            .as_ref()
                            .map(|(phone, _)| phone.clone())
                            .unwrap_or_else(|| addr.to_string());
                        if !rate_limiter.consume(&limit_key) {
                            metrics.rate_limited.inc();
                            warn!("Rate limit exceeded for {}", limit_key);
                            continue;
                        }
                        let event = match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => event,
                            Err(e) => {
                                metrics.protocol_errors.inc();
                                warn!("Undecodable frame from {}: {}", addr, e);
                                continue;
                            }
                        };
                        dispatch(event, &exchange, &mut registered, &tx, &metrics).await;
                    }
                    WsMessage::Ping(payload) => {
                        if write.send(WsMessage::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    WsMessage::Pong(_) => {}
                    WsMessage::Binary(_) => {
                        metrics.protocol_errors.inc();
                        debug!("Ignoring binary frame from {}", addr);
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    if let Some((phone, conn_id)) = registered {
        exchange.lock().await.disconnect(&phone, conn_id);
    }
    metrics.connections_active.dec();
    info!("Connection closed: {}", addr);
}

async fn dispatch(
    event: ClientEvent,
    exchange: &SharedExchange,
    registered: &mut Option<(String, u64)>,
    tx: &Mailbox,
    metrics: &RelayMetrics,
) {
    match event {
        ClientEvent::Register { id, name, phone } => {
            let mut exchange = exchange.lock().await;
            match exchange.register(id, name, phone.clone(), tx.clone()) {
                Ok(conn_id) => {
                    // Rebinding the socket to a new phone releases the
                    // old one; same-phone re-registration already
                    // superseded the session inside the engine
                    if let Some((old_phone, old_conn)) = registered.take() {
                        if old_phone != phone {
                            exchange.disconnect(&old_phone, old_conn);
                        }
                    }
                    *registered = Some((phone, conn_id));
                }
                Err(err) => {
                    metrics.protocol_errors.inc();
                    let _ = tx.send(ServerEvent::message_error(&err));
                }
            }
        }
        event => match registered.as_ref() {
            Some((caller, _)) => {
                let caller = caller.clone();
                let mut exchange = exchange.lock().await;
                handle_registered(&mut exchange, &caller, event, metrics);
            }
            None => reply_unregistered(event, tx),
        },
    }
}

fn handle_registered(
    exchange: &mut Exchange,
    caller: &str,
    event: ClientEvent,
    metrics: &RelayMetrics,
) {
    match event {
        ClientEvent::AddContact { phone, request_id } => {
            exchange.add_contact(caller, &phone, request_id)
        }
        ClientEvent::RemoveContact { phone, request_id } => {
            exchange.remove_contact(caller, &phone, request_id)
        }
        ClientEvent::GetUserContacts { request_id } => exchange.list_contacts(caller, request_id),
        ClientEvent::FindUserByPhone { phone, request_id } => {
            exchange.find_user(caller, &phone, request_id)
        }
        ClientEvent::SendMessage {
            text,
            receiver_phone,
            temp_id,
            reply_to,
        } => {
            metrics.messages_relayed.inc();
            exchange.send_message(caller, &receiver_phone, text, reply_to, temp_id)
        }
        ClientEvent::SendVoiceMessage {
            audio_data,
            duration,
            receiver_phone,
            temp_id,
        } => {
            metrics.messages_relayed.inc();
            exchange.send_voice_message(caller, &receiver_phone, audio_data, duration, temp_id)
        }
        ClientEvent::MarkAsRead { message_id } => exchange.mark_as_read(caller, &message_id),
        ClientEvent::DeleteMessage {
            message_id,
            delete_for_everyone,
        } => exchange.delete_message(caller, &message_id, delete_for_everyone),
        ClientEvent::LoadMessages {
            current_user_phone,
            contact_phone,
            request_id,
        } => exchange.load_messages(caller, &current_user_phone, &contact_phone, request_id),
        ClientEvent::StartCall {
            receiver_phone,
            call_type,
        } => {
            metrics.calls_started.inc();
            exchange.start_call(caller, &receiver_phone, call_type)
        }
        ClientEvent::AcceptCall { call_id } => exchange.accept_call(caller, &call_id),
        ClientEvent::RejectCall { call_id } => exchange.reject_call(caller, &call_id),
        ClientEvent::EndCall { call_id } => exchange.end_call(caller, &call_id),
        ClientEvent::WebrtcOffer {
            receiver_phone,
            offer,
            call_type,
        } => {
            metrics.signaling_frames.inc();
            exchange.relay_offer(caller, &receiver_phone, offer, call_type)
        }
        ClientEvent::WebrtcAnswer { caller_phone, answer } => {
            metrics.signaling_frames.inc();
            exchange.relay_answer(&caller_phone, answer)
        }
        ClientEvent::WebrtcIceCandidate {
            target_phone,
            candidate,
        } => {
            metrics.signaling_frames.inc();
            exchange.relay_ice(&target_phone, candidate)
        }
        ClientEvent::Unknown => {
            metrics.protocol_errors.inc();
            debug!("Unknown event type from {}", caller);
        }
        // Handled in dispatch
        ClientEvent::Register { .. } => {}
    }
}

/// Answers request/response events on an unregistered connection with
/// failure acks so client promises resolve. Fire-and-forget events are
/// dropped.
fn reply_unregistered(event: ClientEvent, tx: &Mailbox) {
    let not_registered = RelayError::NotRegistered.to_string();
    let ack = match event {
        ClientEvent::AddContact { request_id, .. } => Some(ServerEvent::ContactAddResult {
            request_id,
            success: false,
            message: not_registered,
            contact: None,
        }),
        ClientEvent::RemoveContact { request_id, .. } => Some(ServerEvent::ContactRemoveResult {
            request_id,
            success: false,
            message: not_registered,
        }),
        ClientEvent::GetUserContacts { request_id } => Some(ServerEvent::ContactList {
            request_id,
            contacts: Vec::new(),
        }),
        ClientEvent::FindUserByPhone { request_id, .. } => Some(ServerEvent::UserFound {
            request_id,
            user: None,
        }),
        ClientEvent::LoadMessages { request_id, .. } => Some(ServerEvent::MessageHistory {
            request_id,
            messages: Vec::new(),
        }),
        _ => {
            debug!("Dropping event from unregistered connection");
            None
        }
    };
    if let Some(event) = ack {
        let _ = tx.send(event);
    }
}
