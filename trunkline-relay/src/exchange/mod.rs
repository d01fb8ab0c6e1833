//! The Exchange
//!
//! Process-wide relay state: the session registry, contact graph,
//! conversation store, offline queue, deletion ledger and active-call
//! index, all behind one lock.
//!
//! Every public method is synchronous and returns without suspending.
//! Callers hold the lock for the duration of exactly one inbound event,
//! so no two handlers ever interleave mid-mutation and, for a fixed
//! sender and receiver, messages reach the receiver's mailbox in send
//! order. Outbound delivery is notify-and-continue: events are pushed
//! into per-connection mailboxes and the socket task drains them.

mod calls;
mod contacts;
mod deletion;
mod messaging;
mod retention;
mod sessions;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::debug;

use trunkline_core::{CallSession, Identity, Message, ServerEvent};

/// Delivery handle for one live connection. The socket task owns the
/// receiving end and forwards events onto the wire.
pub type Mailbox = UnboundedSender<ServerEvent>;

/// The exchange behind its single lock.
pub type SharedExchange = Arc<Mutex<Exchange>>;

/// A live connection bound to a phone.
///
/// `conn_id` distinguishes the current connection from earlier ones
/// for the same phone, so a stale socket closing late cannot knock a
/// freshly reconnected identity offline.
struct Session {
    conn_id: u64,
    mailbox: Mailbox,
}

/// Locator for a message awaiting delivery to an offline receiver.
struct QueuedMessage {
    conversation_id: String,
    message_id: String,
}

pub struct Exchange {
    /// Identity records by phone. Never removed once registered.
    users: HashMap<String, Identity>,
    /// Live connections by phone.
    sessions: HashMap<String, Session>,
    /// Contact lists by owner phone, in insertion order.
    contacts: HashMap<String, Vec<String>>,
    /// Append-only conversation logs by conversation id.
    conversations: HashMap<String, Vec<Message>>,
    /// Offline queues by receiver phone.
    queued: HashMap<String, VecDeque<QueuedMessage>>,
    /// Per-phone hidden message ids (delete-for-me ledger).
    hidden: HashMap<String, HashSet<String>>,
    /// Active call sessions by call id. Terminal sessions are removed
    /// at the transition, so everything here is ringing or ongoing.
    calls: HashMap<String, CallSession>,
    next_conn_id: u64,
}

impl Exchange {
    pub fn new() -> Self {
        Exchange {
            users: HashMap::new(),
            sessions: HashMap::new(),
            contacts: HashMap::new(),
            conversations: HashMap::new(),
            queued: HashMap::new(),
            hidden: HashMap::new(),
            calls: HashMap::new(),
            next_conn_id: 0,
        }
    }

    pub fn into_shared(self) -> SharedExchange {
        Arc::new(Mutex::new(self))
    }

    /// Pushes an event into a phone's mailbox, if it has one. A closed
    /// mailbox means the socket task is already winding down; the
    /// registry catches up when its disconnect runs.
    fn send_to(&self, phone: &str, event: ServerEvent) {
        if let Some(session) = self.sessions.get(phone) {
            if session.mailbox.send(event).is_err() {
                debug!("Mailbox for {} is closed, event dropped", phone);
            }
        }
    }

    /// Sends an event to every live connection except `exclude`.
    fn broadcast_except(&self, exclude: &str, event: &ServerEvent) {
        for (phone, session) in &self.sessions {
            if phone != exclude {
                let _ = session.mailbox.send(event.clone());
            }
        }
    }

    fn is_online(&self, phone: &str) -> bool {
        self.sessions.contains_key(phone)
    }

    // Scrape-time counts for the metrics endpoint.

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn online_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn message_count(&self) -> usize {
        self.conversations.values().map(|log| log.len()).sum()
    }

    pub fn queued_count(&self) -> usize {
        self.queued.values().map(|q| q.len()).sum()
    }

    pub fn active_call_count(&self) -> usize {
        self.calls.len()
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}
