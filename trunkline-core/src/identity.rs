// SPDX-FileCopyrightText: 2026 Trunkline Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Identity Types
//!
//! Registered participants, keyed by phone number in international format.
//! The relay keeps one record per phone for the lifetime of the process;
//! presence flips between online and offline as connections come and go.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::now_ms;
use crate::error::{RelayError, RelayResult};

/// Minimum digits after the leading `+`.
pub const PHONE_MIN_DIGITS: usize = 8;
/// Maximum digits after the leading `+`.
pub const PHONE_MAX_DIGITS: usize = 15;

/// A registered participant.
///
/// Serializes to the wire shape used in `registrationSuccess`, presence
/// broadcasts and contact listings. The live connection handle is held by
/// the relay's session registry, not here, so identity snapshots can be
/// cloned onto the wire freely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable id, client-supplied or generated at first registration.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Phone number in international format, the primary key.
    pub phone: String,
    pub is_online: bool,
    /// Last presence change, UNIX epoch milliseconds.
    #[serde(rename = "lastSeen")]
    pub last_seen_ms: u64,
}

impl Identity {
    /// Creates a record for a first-time registration. A missing or empty
    /// client id gets a generated one.
    pub fn new(id: Option<String>, name: String, phone: String) -> Self {
        let id = match id {
            Some(id) if !id.is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };
        Identity {
            id,
            name,
            phone,
            is_online: true,
            last_seen_ms: now_ms(),
        }
    }

    /// Flips presence and stamps `lastSeen`.
    pub fn set_online(&mut self, online: bool) {
        self.is_online = online;
        self.last_seen_ms = now_ms();
    }
}

/// Validates a phone number in international format.
///
/// Accepted shape: a leading `+`, then 8 to 15 ASCII digits with a
/// non-zero first digit. No spaces or punctuation; the phone is a map
/// key and must be byte-identical across registrations to match.
pub fn validate_phone(phone: &str) -> RelayResult<()> {
    let Some(digits) = phone.strip_prefix('+') else {
        return Err(RelayError::InvalidPhone);
    };

    let digit_count = digits.chars().filter(|c| c.is_ascii_digit()).count();
    if digit_count != digits.len() {
        return Err(RelayError::InvalidPhone);
    }
    if digit_count < PHONE_MIN_DIGITS || digit_count > PHONE_MAX_DIGITS {
        return Err(RelayError::InvalidPhone);
    }

    // Country codes never start with zero
    if digits.starts_with('0') {
        return Err(RelayError::InvalidPhone);
    }

    Ok(())
}
