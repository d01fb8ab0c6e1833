//! Message Delivery
//!
//! Stores every message in its conversation log, echoes it to the
//! sender with a single status receipt, and either pushes it to the
//! receiver or queues a reference for their next registration.

use tracing::{debug, info, warn};

use trunkline_core::{
    conversation_id, DeliveryStatus, Message, RelayError, ServerEvent, HISTORY_LIMIT, MAX_TEXT_LEN,
};

use super::{Exchange, QueuedMessage};

impl Exchange {
    /// Accepts a text message from `sender_phone`. Failures surface as
    /// `messageError` on the sender's mailbox.
    pub fn send_message(
        &mut self,
        sender_phone: &str,
        receiver_phone: &str,
        text: String,
        reply_to: Option<String>,
        temp_id: Option<String>,
    ) {
        if text.len() > MAX_TEXT_LEN {
            let err = RelayError::MessageTooLong { max: MAX_TEXT_LEN };
            self.send_to(sender_phone, ServerEvent::message_error(&err));
            return;
        }
        let Some(sender) = self.users.get(sender_phone) else {
            warn!("Message from unknown sender {}", sender_phone);
            return;
        };
        if !self.users.contains_key(receiver_phone) {
            self.send_to(
                sender_phone,
                ServerEvent::message_error(&RelayError::ReceiverNotFound),
            );
            return;
        }
        let message = Message::text(sender, receiver_phone, text, reply_to, temp_id);
        self.deliver(message);
    }

    /// Accepts a voice message. The audio payload is opaque to the
    /// relay and exempt from the text length cap.
    pub fn send_voice_message(
        &mut self,
        sender_phone: &str,
        receiver_phone: &str,
        audio_data: String,
        duration_sec: u32,
        temp_id: Option<String>,
    ) {
        let Some(sender) = self.users.get(sender_phone) else {
            warn!("Voice message from unknown sender {}", sender_phone);
            return;
        };
        if !self.users.contains_key(receiver_phone) {
            self.send_to(
                sender_phone,
                ServerEvent::message_error(&RelayError::ReceiverNotFound),
            );
            return;
        }
        let message = Message::voice(sender, receiver_phone, audio_data, duration_sec, temp_id);
        self.deliver(message);
    }

    fn deliver(&mut self, mut message: Message) {
        let sender_phone = message.sender_phone.clone();
        let receiver_phone = message.receiver_phone.clone();

        let receiver_online = self.is_online(&receiver_phone);
        if receiver_online {
            message.status.advance(DeliveryStatus::Delivered);
        }

        let conversation_id = message.conversation_id.clone();
        let message_id = message.id.clone();
        self.conversations
            .entry(conversation_id.clone())
            .or_default()
            .push(message.clone());
        info!("Message stored for conversation {}", conversation_id);

        self.auto_add_contacts(&sender_phone, &receiver_phone);

        self.send_to(&sender_phone, ServerEvent::NewMessage(message.clone()));
        self.send_to(
            &sender_phone,
            ServerEvent::MessageStatus {
                message_id: message_id.clone(),
                status: message.status,
            },
        );

        if receiver_online {
            self.send_to(&receiver_phone, ServerEvent::NewMessage(message));
        } else {
            debug!("Receiver {} offline, queueing {}", receiver_phone, message_id);
            self.queued
                .entry(receiver_phone)
                .or_default()
                .push_back(QueuedMessage {
                    conversation_id,
                    message_id,
                });
        }
    }

    /// Marks a message read on behalf of its receiver and tells the
    /// sender. The id may be the client's provisional one; the receipt
    /// always carries the server id.
    pub fn mark_as_read(&mut self, caller: &str, message_id: &str) {
        let receipt = {
            let Some(message) = self.find_message_mut(message_id) else {
                debug!("markAsRead for unknown message {}", message_id);
                return;
            };
            if message.receiver_phone != caller {
                warn!("markAsRead from {} who is not the receiver", caller);
                return;
            }
            if !message.status.advance(DeliveryStatus::Read) {
                return;
            }
            (message.sender_phone.clone(), message.id.clone())
        };
        let (sender_phone, server_id) = receipt;
        self.send_to(
            &sender_phone,
            ServerEvent::MessageStatus {
                message_id: server_id,
                status: DeliveryStatus::Read,
            },
        );
    }

    /// Answers with conversation history between the two phones,
    /// oldest first and capped to the most recent entries. Messages
    /// the caller deleted for themselves are filtered out.
    pub fn load_messages(
        &self,
        caller: &str,
        user_phone: &str,
        contact_phone: &str,
        request_id: String,
    ) {
        let key = conversation_id(user_phone, contact_phone);
        let hidden = self.hidden.get(caller);
        let mut messages: Vec<Message> = self
            .conversations
            .get(&key)
            .map(|log| {
                log.iter()
                    .filter(|m| hidden.map_or(true, |h| !h.contains(&m.id)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        messages.sort_by_key(|m| m.timestamp_ms);
        if messages.len() > HISTORY_LIMIT {
            messages.drain(..messages.len() - HISTORY_LIMIT);
        }
        self.send_to(caller, ServerEvent::MessageHistory { request_id, messages });
    }

    /// Finds a stored message by server id or provisional id.
    pub(super) fn find_message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.conversations
            .values_mut()
            .flat_map(|log| log.iter_mut())
            .find(|m| m.matches_id(message_id))
    }
}
