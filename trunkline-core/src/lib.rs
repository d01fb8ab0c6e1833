//! Trunkline Core Library
//!
//! Domain types and wire protocol for the Trunkline relay: registered
//! identities, direct messages with delivery tracking, call sessions,
//! and the tagged JSON events exchanged over a relay socket.
//!
//! This crate is transport-free. The relay server drives these types;
//! clients can reuse them to speak the same protocol.

pub mod call;
pub mod clock;
pub mod error;
pub mod event;
pub mod identity;
pub mod message;

pub use call::{CallKind, CallSession, CallStatus};
pub use clock::now_ms;
pub use error::{RelayError, RelayResult};
pub use event::{ClientEvent, ServerEvent};
pub use identity::{validate_phone, Identity, PHONE_MAX_DIGITS, PHONE_MIN_DIGITS};
pub use message::{
    conversation_id, DeliveryStatus, Message, HISTORY_LIMIT, LOCAL_DELETE_TEXT, MAX_TEXT_LEN,
    TOMBSTONE_TEXT, VOICE_PLACEHOLDER_TEXT,
};
