//! Session Registry
//!
//! Binds phones to live connections, drives presence broadcasts and
//! flushes the offline queue on reconnect.

use tracing::{debug, info, warn};

use trunkline_core::{validate_phone, DeliveryStatus, Identity, RelayResult, ServerEvent};

use super::{Exchange, Mailbox, Session};

impl Exchange {
    /// Registers a phone on a connection and returns the connection id
    /// the socket task must present when it later disconnects.
    ///
    /// Re-registration reuses the stored identity record (the original
    /// id and name win over anything in the new payload) and replaces
    /// the connection handle, closing out any previous mailbox. The
    /// new connection receives `registrationSuccess` with the hydrated
    /// contact list, then any queued messages, and everyone else sees
    /// a `userOnline` broadcast.
    pub fn register(
        &mut self,
        id: Option<String>,
        name: String,
        phone: String,
        mailbox: Mailbox,
    ) -> RelayResult<u64> {
        validate_phone(&phone)?;

        let user = self
            .users
            .entry(phone.clone())
            .or_insert_with(|| Identity::new(id, name, phone.clone()));
        user.set_online(true);
        let user = user.clone();

        self.contacts.entry(phone.clone()).or_default();

        self.next_conn_id += 1;
        let conn_id = self.next_conn_id;
        self.sessions.insert(phone.clone(), Session { conn_id, mailbox });

        let contacts = self.contact_snapshots(&phone);
        self.send_to(
            &phone,
            ServerEvent::RegistrationSuccess {
                user: user.clone(),
                contacts,
            },
        );

        self.flush_queued(&phone);

        self.broadcast_except(&phone, &ServerEvent::UserOnline(user.clone()));
        info!("User registered: {} {}", user.name, user.phone);

        Ok(conn_id)
    }

    /// Marks a phone offline when its connection closes.
    ///
    /// `conn_id` must match the registration that is closing; a stale
    /// socket winding down after the phone already reconnected must
    /// not knock the new session offline.
    pub fn disconnect(&mut self, phone: &str, conn_id: u64) {
        match self.sessions.get(phone) {
            Some(session) if session.conn_id == conn_id => {}
            _ => {
                debug!("Stale disconnect for {} ignored", phone);
                return;
            }
        }
        self.sessions.remove(phone);

        let Some(user) = self.users.get_mut(phone) else {
            warn!("Session existed for unknown user {}", phone);
            return;
        };
        user.set_online(false);
        let user_id = user.id.clone();
        let name = user.name.clone();

        self.broadcast_except(phone, &ServerEvent::UserOffline { user_id });
        self.end_calls_for_disconnect(phone);
        info!("User disconnected: {}", name);
    }

    /// Delivers everything queued for a phone that just came online.
    /// Senders that are still connected get a `delivered` receipt.
    fn flush_queued(&mut self, phone: &str) {
        let Some(queue) = self.queued.remove(phone) else {
            return;
        };

        let mut deliveries = Vec::new();
        for locator in queue {
            let entry = self
                .conversations
                .get_mut(&locator.conversation_id)
                .and_then(|log| log.iter_mut().find(|m| m.id == locator.message_id));
            let Some(message) = entry else {
                // Swept by retention while it sat in the queue
                debug!("Queued message {} no longer exists", locator.message_id);
                continue;
            };
            let advanced = message.status.advance(DeliveryStatus::Delivered);
            deliveries.push((message.clone(), advanced));
        }

        if !deliveries.is_empty() {
            info!("Delivering {} queued messages to {}", deliveries.len(), phone);
        }
        for (message, advanced) in deliveries {
            self.send_to(phone, ServerEvent::NewMessage(message.clone()));
            if advanced {
                self.send_to(
                    &message.sender_phone,
                    ServerEvent::MessageStatus {
                        message_id: message.id,
                        status: DeliveryStatus::Delivered,
                    },
                );
            }
        }
    }
}
