// SPDX-FileCopyrightText: 2026 Trunkline Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Relay Error Types
//!
//! Unified error type for relay operations. Display strings are surfaced
//! verbatim to clients in `messageError` / `callError` payloads and in
//! request acknowledgements, so they are written as user-facing sentences.

use thiserror::Error;

/// Unified error type for relay operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Operation attempted before a successful registration.
    #[error("User not found")]
    NotRegistered,

    /// Message or call target phone is unknown to the registry.
    #[error("Receiver not found")]
    ReceiverNotFound,

    /// Contact target phone is unknown to the registry.
    #[error("Contact not found")]
    ContactNotFound,

    /// Attempt to add one's own phone as a contact.
    #[error("Cannot add yourself as a contact")]
    SelfContact,

    /// Contact edge already present in the owner's list.
    #[error("Contact already exists")]
    ContactExists,

    /// Phone number fails the international format check.
    #[error("Invalid phone number format")]
    InvalidPhone,

    /// Text body exceeds the allowed length.
    #[error("Message too long (max {max} characters)")]
    MessageTooLong { max: usize },

    /// No message with the given id in any conversation log.
    #[error("Message not found")]
    MessageNotFound,

    /// Delete-for-everyone attempted by someone other than the sender.
    #[error("You can only delete your own messages for everyone")]
    NotMessageSender,

    /// One of the two phones is already in an active call.
    #[error("Call already in progress")]
    CallInProgress,
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
