//! Message Deletion
//!
//! Two shapes: delete-for-everyone replaces the stored body with a
//! tombstone both parties see, delete-for-me hides the message from
//! the caller's history only. The stored record never leaves the log;
//! retention is the only thing that drops rows.

use tracing::info;

use trunkline_core::{RelayError, ServerEvent, LOCAL_DELETE_TEXT, TOMBSTONE_TEXT};

use super::Exchange;

impl Exchange {
    /// Deletes a message on behalf of `caller`. Failures come back as
    /// `messageError`; the id may be a provisional one.
    pub fn delete_message(&mut self, caller: &str, message_id: &str, for_everyone: bool) {
        let result = if for_everyone {
            self.delete_for_everyone(caller, message_id)
        } else {
            self.delete_for_me(caller, message_id)
        };
        if let Err(err) = result {
            self.send_to(caller, ServerEvent::message_error(&err));
        }
    }

    fn delete_for_everyone(&mut self, caller: &str, message_id: &str) -> Result<(), RelayError> {
        let (server_id, sender_phone, receiver_phone) = {
            let message = self
                .find_message_mut(message_id)
                .ok_or(RelayError::MessageNotFound)?;
            if message.sender_phone != caller {
                return Err(RelayError::NotMessageSender);
            }
            message.redact_for_everyone();
            (
                message.id.clone(),
                message.sender_phone.clone(),
                message.receiver_phone.clone(),
            )
        };

        let event = ServerEvent::MessageDeleted {
            message_id: server_id,
            delete_for_everyone: true,
            deleted_text: TOMBSTONE_TEXT.to_string(),
        };
        self.send_to(&sender_phone, event.clone());
        self.send_to(&receiver_phone, event);
        info!("Message deleted for everyone by {}", caller);
        Ok(())
    }

    fn delete_for_me(&mut self, caller: &str, message_id: &str) -> Result<(), RelayError> {
        let server_id = {
            let message = self
                .find_message_mut(message_id)
                .ok_or(RelayError::MessageNotFound)?;
            // Outsiders get the same answer as an unknown id
            if message.sender_phone != caller && message.receiver_phone != caller {
                return Err(RelayError::MessageNotFound);
            }
            message.id.clone()
        };

        self.hidden
            .entry(caller.to_string())
            .or_default()
            .insert(server_id.clone());
        self.send_to(
            caller,
            ServerEvent::MessageDeleted {
                message_id: server_id,
                delete_for_everyone: false,
                deleted_text: LOCAL_DELETE_TEXT.to_string(),
            },
        );
        Ok(())
    }
}
