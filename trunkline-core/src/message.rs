// SPDX-FileCopyrightText: 2026 Trunkline Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Message and Delivery Types
//!
//! Direct messages between two phones, grouped into conversations by an
//! order-independent key. Delivery status only ever moves forward along
//! Sent -> Delivered -> Read.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::now_ms;
use crate::identity::Identity;

/// Maximum text body length in bytes. Voice messages are exempt.
pub const MAX_TEXT_LEN: usize = 4096;

/// History window returned by a conversation load.
pub const HISTORY_LIMIT: usize = 100;

/// Text shown in place of a message deleted for everyone.
pub const TOMBSTONE_TEXT: &str = "This message was deleted";

/// Deletion notice shown only to the user who hid a message locally.
pub const LOCAL_DELETE_TEXT: &str = "You deleted this message";

/// Text body stored for voice messages.
pub const VOICE_PLACEHOLDER_TEXT: &str = "Voice message";

/// Order-independent conversation key for a pair of phones.
///
/// Both orderings of the same pair map to the same key, so either side
/// can address the shared log.
pub fn conversation_id(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}_{hi}")
}

/// Delivery state of a message. Ordered: later states compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    /// Moves to `to` if that is a forward step, otherwise leaves the
    /// status untouched. Returns whether a change happened.
    ///
    /// A read receipt that races ahead of delivery, or arrives twice,
    /// degrades to a no-op instead of regressing the status.
    pub fn advance(&mut self, to: DeliveryStatus) -> bool {
        if to > *self {
            *self = to;
            true
        } else {
            false
        }
    }
}

/// A single direct message in a conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id, unique across all conversations.
    pub id: String,
    /// Client-side provisional id, echoed back for reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    pub conversation_id: String,
    pub sender_phone: String,
    /// Sender display name at send time, for receiver-side rendering.
    pub sender_name: String,
    pub receiver_phone: String,
    pub text: String,
    /// Send time, UNIX epoch milliseconds.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    pub deleted: bool,
    pub deleted_for_everyone: bool,
    pub is_voice: bool,
    /// Opaque encoded audio, present only on voice messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_duration_sec: Option<u32>,
}

impl Message {
    /// Builds a text message with status `Sent`.
    pub fn text(
        sender: &Identity,
        receiver_phone: &str,
        text: String,
        reply_to_id: Option<String>,
        temp_id: Option<String>,
    ) -> Self {
        let mut message = Self::base(sender, receiver_phone, text, temp_id);
        message.reply_to_id = reply_to_id;
        message
    }

    /// Builds a voice message with status `Sent`. The text body is a
    /// fixed placeholder; the audio travels in `voice_payload`.
    pub fn voice(
        sender: &Identity,
        receiver_phone: &str,
        voice_payload: String,
        duration_sec: u32,
        temp_id: Option<String>,
    ) -> Self {
        let mut message =
            Self::base(sender, receiver_phone, VOICE_PLACEHOLDER_TEXT.to_string(), temp_id);
        message.is_voice = true;
        message.voice_payload = Some(voice_payload);
        message.voice_duration_sec = Some(duration_sec);
        message
    }

    fn base(sender: &Identity, receiver_phone: &str, text: String, temp_id: Option<String>) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            temp_id,
            conversation_id: conversation_id(&sender.phone, receiver_phone),
            sender_phone: sender.phone.clone(),
            sender_name: sender.name.clone(),
            receiver_phone: receiver_phone.to_string(),
            text,
            timestamp_ms: now_ms(),
            status: DeliveryStatus::Sent,
            reply_to_id: None,
            deleted: false,
            deleted_for_everyone: false,
            is_voice: false,
            voice_payload: None,
            voice_duration_sec: None,
        }
    }

    /// True if `id` names this message by server id or provisional id.
    pub fn matches_id(&self, id: &str) -> bool {
        self.id == id || self.temp_id.as_deref() == Some(id)
    }

    /// Replaces the body with the shared tombstone. The record stays in
    /// the log so both histories show the deletion.
    pub fn redact_for_everyone(&mut self) {
        self.deleted = true;
        self.deleted_for_everyone = true;
        self.text = TOMBSTONE_TEXT.to_string();
    }
}
