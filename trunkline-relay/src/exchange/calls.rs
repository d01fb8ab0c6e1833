//! Call Signaling
//!
//! Drives call sessions through their state machine and forwards the
//! WebRTC negotiation payloads between the two phones. The relay never
//! inspects SDP or ICE content.
//!
//! A session enters the active-call index only when the receiver is
//! online to ring; every terminal transition removes it again, so the
//! index never accumulates finished calls.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use trunkline_core::{now_ms, CallKind, CallSession, CallStatus, RelayError, ServerEvent};

use super::Exchange;

impl Exchange {
    /// Places a call. The caller always receives `callStarted`; an
    /// offline receiver turns the session into an immediate miss and
    /// the caller sees `callEnded` without the receiver ever ringing.
    pub fn start_call(&mut self, caller_phone: &str, receiver_phone: &str, call_type: CallKind) {
        let Some(caller) = self.users.get(caller_phone) else {
            warn!("Call from unknown caller {}", caller_phone);
            return;
        };
        let Some(receiver) = self.users.get(receiver_phone) else {
            self.send_to(
                caller_phone,
                ServerEvent::call_error(&RelayError::ReceiverNotFound),
            );
            return;
        };

        let busy = self
            .calls
            .values()
            .any(|call| call.is_active() && call.shares_pair_with(caller_phone, receiver_phone));
        if busy {
            self.send_to(
                caller_phone,
                ServerEvent::call_error(&RelayError::CallInProgress),
            );
            return;
        }

        let mut session = CallSession::new(caller, receiver, call_type, now_ms());
        self.send_to(caller_phone, ServerEvent::CallStarted(session.clone()));

        if self.is_online(receiver_phone) {
            info!("Call started: {} -> {}", caller_phone, receiver_phone);
            self.send_to(receiver_phone, ServerEvent::IncomingCall(session.clone()));
            self.calls.insert(session.id.clone(), session);
        } else {
            info!("Call missed, receiver {} offline", receiver_phone);
            session.miss(now_ms());
            self.send_to(caller_phone, ServerEvent::CallEnded(session));
        }
    }

    /// Connects a ringing call. Only the ringing receiver may accept;
    /// stale ids and outside phones are logged no-ops, the terminal
    /// state (if any) was already delivered.
    pub fn accept_call(&mut self, caller: &str, call_id: &str) {
        let Some(call) = self.calls.get_mut(call_id) else {
            debug!("Accept for unknown call {}", call_id);
            return;
        };
        if call.receiver_phone != caller {
            warn!("{} tried to accept call {} for {}", caller, call_id, call.receiver_phone);
            return;
        }
        if !call.accept(now_ms()) {
            debug!("Accept for call {} in state {:?} ignored", call_id, call.status);
            return;
        }
        let session = call.clone();
        info!("Call accepted: {}", call_id);
        let receiver_phone = session.receiver_phone.clone();
        self.send_to(&session.caller_phone, ServerEvent::CallAccepted(session.clone()));
        self.send_to(&receiver_phone, ServerEvent::CallAccepted(session));
    }

    /// Declines a ringing call. The caller is told; the receiver's own
    /// client already rendered the decline locally.
    pub fn reject_call(&mut self, caller: &str, call_id: &str) {
        let Some(mut call) = self.calls.remove(call_id) else {
            debug!("Reject for unknown call {}", call_id);
            return;
        };
        if call.receiver_phone != caller {
            warn!("{} tried to reject call {} for {}", caller, call_id, call.receiver_phone);
            self.calls.insert(call_id.to_string(), call);
            return;
        }
        if !call.reject(now_ms()) {
            debug!("Reject for call {} in state {:?} ignored", call_id, call.status);
            self.calls.insert(call_id.to_string(), call);
            return;
        }
        info!("Call rejected: {}", call_id);
        let caller_phone = call.caller_phone.clone();
        self.send_to(&caller_phone, ServerEvent::CallRejected(call));
    }

    /// Hangs up. Either participant may end a ringing or connected
    /// call; both sides get the final session with its duration.
    pub fn end_call(&mut self, caller: &str, call_id: &str) {
        let Some(mut call) = self.calls.remove(call_id) else {
            debug!("End for unknown call {}", call_id);
            return;
        };
        if !call.involves(caller) {
            warn!("{} tried to end call {} they are not part of", caller, call_id);
            self.calls.insert(call_id.to_string(), call);
            return;
        }
        call.end(now_ms());
        info!("Call ended: {} ({}s)", call_id, call.duration_sec);
        let receiver_phone = call.receiver_phone.clone();
        self.send_to(&call.caller_phone, ServerEvent::CallEnded(call.clone()));
        self.send_to(&receiver_phone, ServerEvent::CallEnded(call));
    }

    /// Ends every active call involving a phone that just went away.
    /// Only the surviving party is notified.
    pub(super) fn end_calls_for_disconnect(&mut self, phone: &str) {
        let ids: Vec<String> = self
            .calls
            .values()
            .filter(|call| call.involves(phone))
            .map(|call| call.id.clone())
            .collect();
        for id in ids {
            let Some(mut call) = self.calls.remove(&id) else {
                continue;
            };
            let peer = if call.caller_phone == phone {
                call.receiver_phone.clone()
            } else {
                call.caller_phone.clone()
            };
            call.end(now_ms());
            info!("Call {} torn down, {} disconnected", call.id, phone);
            self.send_to(&peer, ServerEvent::CallEnded(call));
        }
    }

    /// Converts rings older than `timeout` into missed calls, telling
    /// both phones. Returns how many expired.
    pub fn expire_stale_rings(&mut self, timeout: Duration) -> usize {
        let now = now_ms();
        let limit_ms = timeout.as_millis() as u64;
        let stale: Vec<String> = self
            .calls
            .values()
            .filter(|call| {
                call.status == CallStatus::Calling
                    && now.saturating_sub(call.started_at_ms) > limit_ms
            })
            .map(|call| call.id.clone())
            .collect();

        let expired = stale.len();
        for id in stale {
            let Some(mut call) = self.calls.remove(&id) else {
                continue;
            };
            call.miss(now);
            let receiver_phone = call.receiver_phone.clone();
            self.send_to(&call.caller_phone, ServerEvent::CallEnded(call.clone()));
            self.send_to(&receiver_phone, ServerEvent::CallEnded(call));
        }
        if expired > 0 {
            info!("Expired {} unanswered calls", expired);
        }
        expired
    }

    /// Forwards an SDP offer. Signaling to an offline phone is dropped.
    pub fn relay_offer(
        &self,
        caller_phone: &str,
        receiver_phone: &str,
        offer: Value,
        call_type: CallKind,
    ) {
        if !self.is_online(receiver_phone) {
            debug!("Dropping offer for offline {}", receiver_phone);
            return;
        }
        self.send_to(
            receiver_phone,
            ServerEvent::WebrtcOffer {
                offer,
                caller_phone: caller_phone.to_string(),
                call_type,
            },
        );
    }

    /// Forwards an SDP answer back to the dialing side.
    pub fn relay_answer(&self, target_phone: &str, answer: Value) {
        if !self.is_online(target_phone) {
            debug!("Dropping answer for offline {}", target_phone);
            return;
        }
        self.send_to(target_phone, ServerEvent::WebrtcAnswer { answer });
    }

    /// Forwards one ICE candidate.
    pub fn relay_ice(&self, target_phone: &str, candidate: Value) {
        if !self.is_online(target_phone) {
            debug!("Dropping ICE candidate for offline {}", target_phone);
            return;
        }
        self.send_to(target_phone, ServerEvent::WebrtcIceCandidate { candidate })
    }
}
