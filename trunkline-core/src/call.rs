//! Call Session State Machine
//!
//! Audio and video call sessions between two phones. Legal transitions:
//! `Calling -> Ongoing | Rejected | Missed` and `Ongoing -> Ended`
//! (plus `Calling -> Ended` for a caller hanging up while ringing).
//! Illegal transitions are no-ops, since the peer may already have torn
//! the call down locally.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Calling,
    Ongoing,
    Rejected,
    Missed,
    Ended,
}

/// One call session. Lives in the active-call index from dial until a
/// terminal transition, then survives only in wire notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub id: String,
    pub caller_phone: String,
    pub caller_name: String,
    pub receiver_phone: String,
    pub receiver_name: String,
    pub call_type: CallKind,
    pub status: CallStatus,
    /// Dial time, reset to acceptance time when the call connects.
    /// UNIX epoch milliseconds.
    #[serde(rename = "startTime")]
    pub started_at_ms: u64,
    #[serde(rename = "endTime", default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    /// Seconds from the last clock start to hangup. Stays 0 for
    /// rejected and missed calls.
    #[serde(rename = "duration")]
    pub duration_sec: u64,
}

impl CallSession {
    pub fn new(caller: &Identity, receiver: &Identity, call_type: CallKind, now_ms: u64) -> Self {
        CallSession {
            id: Uuid::new_v4().to_string(),
            caller_phone: caller.phone.clone(),
            caller_name: caller.name.clone(),
            receiver_phone: receiver.phone.clone(),
            receiver_name: receiver.name.clone(),
            call_type,
            status: CallStatus::Calling,
            started_at_ms: now_ms,
            ended_at_ms: None,
            duration_sec: 0,
        }
    }

    /// True while the session belongs in the active-call index.
    pub fn is_active(&self) -> bool {
        matches!(self.status, CallStatus::Calling | CallStatus::Ongoing)
    }

    pub fn involves(&self, phone: &str) -> bool {
        self.caller_phone == phone || self.receiver_phone == phone
    }

    /// True if both sessions tie up one of the same two phones.
    pub fn shares_pair_with(&self, a: &str, b: &str) -> bool {
        self.involves(a) || self.involves(b)
    }

    /// `Calling -> Ongoing`. Restarts the clock: billed duration counts
    /// from acceptance, not from dial.
    pub fn accept(&mut self, now_ms: u64) -> bool {
        if self.status != CallStatus::Calling {
            return false;
        }
        self.status = CallStatus::Ongoing;
        self.started_at_ms = now_ms;
        true
    }

    /// `Calling -> Rejected`.
    pub fn reject(&mut self, now_ms: u64) -> bool {
        if self.status != CallStatus::Calling {
            return false;
        }
        self.status = CallStatus::Rejected;
        self.ended_at_ms = Some(now_ms);
        true
    }

    /// `Calling -> Missed`. Used for offline receivers and rings that
    /// exceed the ring timeout.
    pub fn miss(&mut self, now_ms: u64) -> bool {
        if self.status != CallStatus::Calling {
            return false;
        }
        self.status = CallStatus::Missed;
        self.ended_at_ms = Some(now_ms);
        true
    }

    /// `Calling | Ongoing -> Ended`, computing the connected duration.
    pub fn end(&mut self, now_ms: u64) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = CallStatus::Ended;
        self.ended_at_ms = Some(now_ms);
        self.duration_sec = now_ms.saturating_sub(self.started_at_ms) / 1000;
        true
    }
}
