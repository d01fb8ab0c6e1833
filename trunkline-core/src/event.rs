// SPDX-FileCopyrightText: 2026 Trunkline Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire Protocol Events
//!
//! Every frame on the relay socket is one JSON object tagged by a
//! `type` field, one of the variants below. `ClientEvent` travels
//! client to relay, `ServerEvent` relay to client.
//!
//! Request-style client events (`addContact`, `getUserContacts`,
//! `findUserByPhone`, `loadMessages`) carry a client-chosen `requestId`
//! that the relay echoes in the matching response event, so a client
//! can run several requests concurrently over the one socket.
//!
//! WebRTC signaling payloads (offers, answers, ICE candidates) are
//! opaque to the relay and forwarded as raw JSON values.
//!
//! The call kind travels as `callType`; `type` is taken by the frame
//! tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::{CallKind, CallSession};
use crate::error::RelayError;
use crate::identity::Identity;
use crate::message::{DeliveryStatus, Message};

/// Events sent by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Bind this connection to a phone number. Must be the first
    /// successful event on a connection; everything else is ignored
    /// until registration completes.
    #[serde(rename_all = "camelCase")]
    Register {
        #[serde(default)]
        id: Option<String>,
        name: String,
        phone: String,
    },

    #[serde(rename_all = "camelCase")]
    AddContact { phone: String, request_id: String },

    #[serde(rename_all = "camelCase")]
    RemoveContact { phone: String, request_id: String },

    #[serde(rename_all = "camelCase")]
    GetUserContacts { request_id: String },

    #[serde(rename_all = "camelCase")]
    FindUserByPhone { phone: String, request_id: String },

    #[serde(rename_all = "camelCase")]
    SendMessage {
        text: String,
        receiver_phone: String,
        #[serde(default)]
        temp_id: Option<String>,
        #[serde(default)]
        reply_to: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    SendVoiceMessage {
        /// Opaque encoded audio, stored and forwarded as-is.
        audio_data: String,
        /// Recording length in seconds.
        duration: u32,
        receiver_phone: String,
        #[serde(default)]
        temp_id: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    MarkAsRead { message_id: String },

    #[serde(rename_all = "camelCase")]
    DeleteMessage {
        message_id: String,
        #[serde(default)]
        delete_for_everyone: bool,
    },

    #[serde(rename_all = "camelCase")]
    LoadMessages {
        current_user_phone: String,
        contact_phone: String,
        request_id: String,
    },

    #[serde(rename_all = "camelCase")]
    StartCall {
        receiver_phone: String,
        call_type: CallKind,
    },

    #[serde(rename_all = "camelCase")]
    AcceptCall { call_id: String },

    #[serde(rename_all = "camelCase")]
    RejectCall { call_id: String },

    #[serde(rename_all = "camelCase")]
    EndCall { call_id: String },

    #[serde(rename_all = "camelCase")]
    WebrtcOffer {
        receiver_phone: String,
        offer: Value,
        call_type: CallKind,
    },

    #[serde(rename_all = "camelCase")]
    WebrtcAnswer { caller_phone: String, answer: Value },

    #[serde(rename_all = "camelCase")]
    WebrtcIceCandidate { target_phone: String, candidate: Value },

    /// Unrecognized `type` tag; logged and dropped by the relay.
    #[serde(other)]
    Unknown,
}

/// Events sent by the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Registration acknowledgement with the stored identity and the
    /// hydrated contact list, in insertion order.
    #[serde(rename_all = "camelCase")]
    RegistrationSuccess {
        user: Identity,
        contacts: Vec<Identity>,
    },

    /// Presence broadcast to everyone except the identity itself.
    UserOnline(Identity),

    #[serde(rename_all = "camelCase")]
    UserOffline { user_id: String },

    /// The other side of a conversation was added to this client's
    /// contact list (explicitly or by message auto-add).
    ContactAdded(Identity),

    #[serde(rename_all = "camelCase")]
    ContactAddResult {
        request_id: String,
        success: bool,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        contact: Option<Identity>,
    },

    #[serde(rename_all = "camelCase")]
    ContactRemoveResult {
        request_id: String,
        success: bool,
        message: String,
    },

    #[serde(rename_all = "camelCase")]
    ContactList {
        request_id: String,
        contacts: Vec<Identity>,
    },

    /// Lookup response; `user` is `null` when the phone is unknown
    /// (or is the requester's own).
    #[serde(rename_all = "camelCase")]
    UserFound {
        request_id: String,
        user: Option<Identity>,
    },

    /// Fired to the sender as an echo and to the receiver as the
    /// delivery, each carrying the message's current status.
    NewMessage(Message),

    #[serde(rename_all = "camelCase")]
    MessageStatus {
        message_id: String,
        status: DeliveryStatus,
    },

    #[serde(rename_all = "camelCase")]
    MessageHistory {
        request_id: String,
        messages: Vec<Message>,
    },

    #[serde(rename_all = "camelCase")]
    MessageDeleted {
        message_id: String,
        delete_for_everyone: bool,
        deleted_text: String,
    },

    CallStarted(CallSession),
    IncomingCall(CallSession),
    CallAccepted(CallSession),
    CallRejected(CallSession),
    CallEnded(CallSession),

    #[serde(rename_all = "camelCase")]
    WebrtcOffer {
        offer: Value,
        caller_phone: String,
        call_type: CallKind,
    },

    #[serde(rename_all = "camelCase")]
    WebrtcAnswer { answer: Value },

    #[serde(rename_all = "camelCase")]
    WebrtcIceCandidate { candidate: Value },

    #[serde(rename_all = "camelCase")]
    MessageError { message: String },

    #[serde(rename_all = "camelCase")]
    CallError { message: String },
}

impl ServerEvent {
    pub fn message_error(error: &RelayError) -> Self {
        ServerEvent::MessageError {
            message: error.to_string(),
        }
    }

    pub fn call_error(error: &RelayError) -> Self {
        ServerEvent::CallError {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_register() {
        let raw = r#"{"type":"register","name":"Ali","phone":"+923001111111"}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::Register { id, name, phone } => {
                assert_eq!(id, None);
                assert_eq!(name, "Ali");
                assert_eq!(phone, "+923001111111");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_send_message_with_optional_fields_absent() {
        let raw = r#"{"type":"sendMessage","text":"hi","receiverPhone":"+923002222222"}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::SendMessage {
                text,
                receiver_phone,
                temp_id,
                reply_to,
            } => {
                assert_eq!(text, "hi");
                assert_eq!(receiver_phone, "+923002222222");
                assert_eq!(temp_id, None);
                assert_eq!(reply_to, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_delete_message_defaults_to_for_me() {
        let raw = r#"{"type":"deleteMessage","messageId":"m-1"}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::DeleteMessage {
                message_id,
                delete_for_everyone,
            } => {
                assert_eq!(message_id, "m-1");
                assert!(!delete_for_everyone);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_start_call() {
        let raw = r#"{"type":"startCall","receiverPhone":"+923002222222","callType":"video"}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::StartCall {
                receiver_phone,
                call_type,
            } => {
                assert_eq!(receiver_phone, "+923002222222");
                assert_eq!(call_type, CallKind::Video);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_signaling_payloads_stay_opaque() {
        let raw = r#"{"type":"webrtcOffer","receiverPhone":"+923002222222","offer":{"sdp":"v=0...","type":"offer"},"callType":"audio"}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::WebrtcOffer { offer, .. } => {
                assert_eq!(offer["type"], "offer");
                assert_eq!(offer["sdp"], "v=0...");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_tag() {
        let raw = r#"{"type":"totallyNewThing","whatever":1}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, ClientEvent::Unknown));
    }

    #[test]
    fn test_server_event_tags() {
        let offline = ServerEvent::UserOffline {
            user_id: "u1".into(),
        };
        let json = serde_json::to_value(&offline).unwrap();
        assert_eq!(json["type"], "userOffline");
        assert_eq!(json["userId"], "u1");

        let status = ServerEvent::MessageStatus {
            message_id: "m-1".into(),
            status: DeliveryStatus::Delivered,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["type"], "messageStatus");
        assert_eq!(json["status"], "delivered");
    }

    #[test]
    fn test_user_found_serializes_null_for_miss() {
        let miss = ServerEvent::UserFound {
            request_id: "r1".into(),
            user: None,
        };
        let json = serde_json::to_value(&miss).unwrap();
        assert_eq!(json["type"], "userFound");
        assert!(json["user"].is_null());
    }

    #[test]
    fn test_error_helpers_use_display_strings() {
        let event = ServerEvent::message_error(&RelayError::ReceiverNotFound);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "messageError");
        assert_eq!(json["message"], "Receiver not found");

        let event = ServerEvent::call_error(&RelayError::CallInProgress);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "callError");
    }
}
