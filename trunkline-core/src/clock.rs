//! Wall-clock helpers.
//!
//! All protocol timestamps are UNIX epoch milliseconds, matching the
//! `timestamp` fields carried on the wire.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as UNIX epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
