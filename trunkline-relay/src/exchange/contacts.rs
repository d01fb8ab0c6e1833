//! Contact Book
//!
//! Per-user contact lists plus phone-number lookup. Request/response
//! operations always answer on the caller's mailbox, carrying the
//! client's `requestId` back so it can match the reply.

use tracing::info;

use trunkline_core::{validate_phone, Identity, RelayError, ServerEvent};

use super::Exchange;

impl Exchange {
    /// Adds `contact_phone` to the caller's contact list and reports
    /// the outcome through `contactAddResult`. The added party is not
    /// notified; only message delivery wires contacts both ways.
    pub fn add_contact(&mut self, caller: &str, contact_phone: &str, request_id: String) {
        let outcome = self.try_add_contact(caller, contact_phone);
        let event = match outcome {
            Ok(contact) => ServerEvent::ContactAddResult {
                request_id,
                success: true,
                message: "Contact added successfully".into(),
                contact: Some(contact),
            },
            Err(err) => ServerEvent::ContactAddResult {
                request_id,
                success: false,
                message: err.to_string(),
                contact: None,
            },
        };
        self.send_to(caller, event);
    }

    fn try_add_contact(&mut self, caller: &str, contact_phone: &str) -> Result<Identity, RelayError> {
        // Format check happens before any store lookup
        validate_phone(contact_phone)?;
        if contact_phone == caller {
            return Err(RelayError::SelfContact);
        }
        let contact = self
            .users
            .get(contact_phone)
            .cloned()
            .ok_or(RelayError::ContactNotFound)?;
        let list = self.contacts.entry(caller.to_string()).or_default();
        if list.iter().any(|p| p == contact_phone) {
            return Err(RelayError::ContactExists);
        }
        list.push(contact_phone.to_string());
        info!("Contact added: {} -> {}", caller, contact_phone);
        Ok(contact)
    }

    /// Removes a contact, answering with `contactRemoveResult`.
    pub fn remove_contact(&mut self, caller: &str, contact_phone: &str, request_id: String) {
        let list = self.contacts.entry(caller.to_string()).or_default();
        let before = list.len();
        list.retain(|p| p != contact_phone);
        let removed = list.len() < before;

        let event = if removed {
            info!("Contact removed: {} -> {}", caller, contact_phone);
            ServerEvent::ContactRemoveResult {
                request_id,
                success: true,
                message: "Contact removed successfully".into(),
            }
        } else {
            ServerEvent::ContactRemoveResult {
                request_id,
                success: false,
                message: RelayError::ContactNotFound.to_string(),
            }
        };
        self.send_to(caller, event);
    }

    /// Answers with the caller's hydrated contact list.
    pub fn list_contacts(&self, caller: &str, request_id: String) {
        let contacts = self.contact_snapshots(caller);
        self.send_to(caller, ServerEvent::ContactList { request_id, contacts });
    }

    /// Looks a user up by exact phone. The caller's own record is
    /// never returned; `user` is null when nothing matches.
    pub fn find_user(&self, caller: &str, phone: &str, request_id: String) {
        let user = self
            .users
            .get(phone)
            .filter(|user| user.phone != caller)
            .cloned();
        self.send_to(caller, ServerEvent::UserFound { request_id, user });
    }

    /// Current identity snapshots for a phone's contacts, in the order
    /// they were added.
    pub(super) fn contact_snapshots(&self, phone: &str) -> Vec<Identity> {
        self.contacts
            .get(phone)
            .map(|list| {
                list.iter()
                    .filter_map(|p| self.users.get(p))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Wires two phones into each other's contact lists when a message
    /// travels between them. Each side that gains an entry is told via
    /// `contactAdded` so open clients refresh their lists.
    pub(super) fn auto_add_contacts(&mut self, a: &str, b: &str) {
        self.auto_add_one_way(a, b);
        self.auto_add_one_way(b, a);
    }

    fn auto_add_one_way(&mut self, owner: &str, contact_phone: &str) {
        let list = self.contacts.entry(owner.to_string()).or_default();
        if list.iter().any(|p| p == contact_phone) {
            return;
        }
        list.push(contact_phone.to_string());
        if let Some(contact) = self.users.get(contact_phone).cloned() {
            self.send_to(owner, ServerEvent::ContactAdded(contact));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[test]
    fn test_add_contact_succeeds_and_snapshots_identity() {
        let mut exchange = Exchange::new();
        let mut a = register(&mut exchange, "Ali", "+923001111111");
        let _b = register(&mut exchange, "Sara", "+923002222222");
        drain(&mut a);

        exchange.add_contact("+923001111111", "+923002222222", "r1".into());

        match next_event(&mut a) {
            ServerEvent::ContactAddResult {
                request_id,
                success,
                message,
                contact,
            } => {
                assert_eq!(request_id, "r1");
                assert!(success);
                assert_eq!(message, "Contact added successfully");
                let contact = contact.expect("snapshot");
                assert_eq!(contact.phone, "+923002222222");
                assert_eq!(contact.name, "Sara");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_add_contact_rejects_malformed_self_unknown_and_duplicate() {
        let mut exchange = Exchange::new();
        let mut a = register(&mut exchange, "Ali", "+923001111111");
        let _b = register(&mut exchange, "Sara", "+923002222222");
        drain(&mut a);

        exchange.add_contact("+923001111111", "12ab", "r1".into());
        exchange.add_contact("+923001111111", "+923001111111", "r2".into());
        exchange.add_contact("+923001111111", "+923009999999", "r3".into());
        exchange.add_contact("+923001111111", "+923002222222", "r4".into());
        exchange.add_contact("+923001111111", "+923002222222", "r5".into());

        let events = drain(&mut a);
        let messages: Vec<(bool, String)> = events
            .into_iter()
            .map(|e| match e {
                ServerEvent::ContactAddResult { success, message, .. } => (success, message),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(
            messages,
            vec![
                (false, "Invalid phone number format".into()),
                (false, "Cannot add yourself as a contact".into()),
                (false, "Contact not found".into()),
                (true, "Contact added successfully".into()),
                (false, "Contact already exists".into()),
            ]
        );
    }

    #[test]
    fn test_remove_contact() {
        let mut exchange = Exchange::new();
        let mut a = register(&mut exchange, "Ali", "+923001111111");
        let _b = register(&mut exchange, "Sara", "+923002222222");
        drain(&mut a);
        exchange.add_contact("+923001111111", "+923002222222", "r1".into());
        drain(&mut a);

        exchange.remove_contact("+923001111111", "+923002222222", "r2".into());
        match next_event(&mut a) {
            ServerEvent::ContactRemoveResult { success, message, .. } => {
                assert!(success);
                assert_eq!(message, "Contact removed successfully");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        exchange.remove_contact("+923001111111", "+923002222222", "r3".into());
        match next_event(&mut a) {
            ServerEvent::ContactRemoveResult { success, message, .. } => {
                assert!(!success);
                assert_eq!(message, "Contact not found");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_contact_list_reflects_live_presence() {
        let mut exchange = Exchange::new();
        let mut a = register(&mut exchange, "Ali", "+923001111111");
        let conn_b = {
            let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
            exchange
                .register(None, "Sara".into(), "+923002222222".into(), tx)
                .unwrap()
        };
        drain(&mut a);
        exchange.add_contact("+923001111111", "+923002222222", "r1".into());
        drain(&mut a);

        exchange.disconnect("+923002222222", conn_b);
        drain(&mut a);

        exchange.list_contacts("+923001111111", "r2".into());
        match next_event(&mut a) {
            ServerEvent::ContactList { contacts, .. } => {
                assert_eq!(contacts.len(), 1);
                assert!(!contacts[0].is_online);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_find_user_excludes_caller() {
        let mut exchange = Exchange::new();
        let mut a = register(&mut exchange, "Ali", "+923001111111");
        let _b = register(&mut exchange, "Sara", "+923002222222");
        drain(&mut a);

        exchange.find_user("+923001111111", "+923002222222", "r1".into());
        match next_event(&mut a) {
            ServerEvent::UserFound { user, .. } => {
                assert_eq!(user.expect("match").name, "Sara");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        exchange.find_user("+923001111111", "+923001111111", "r2".into());
        match next_event(&mut a) {
            ServerEvent::UserFound { user, .. } => assert!(user.is_none()),
            other => panic!("unexpected event: {other:?}"),
        }

        exchange.find_user("+923001111111", "+923007777777", "r3".into());
        match next_event(&mut a) {
            ServerEvent::UserFound { user, .. } => assert!(user.is_none()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_auto_add_notifies_both_new_sides() {
        let mut exchange = Exchange::new();
        let mut a = register(&mut exchange, "Ali", "+923001111111");
        let mut b = register(&mut exchange, "Sara", "+923002222222");
        drain(&mut a);

        exchange.auto_add_contacts("+923001111111", "+923002222222");

        match next_event(&mut a) {
            ServerEvent::ContactAdded(contact) => assert_eq!(contact.phone, "+923002222222"),
            other => panic!("unexpected event: {other:?}"),
        }
        match next_event(&mut b) {
            ServerEvent::ContactAdded(contact) => assert_eq!(contact.phone, "+923001111111"),
            other => panic!("unexpected event: {other:?}"),
        }

        // Second pass is a no-op
        exchange.auto_add_contacts("+923001111111", "+923002222222");
        assert!(drain(&mut a).is_empty());
        assert!(drain(&mut b).is_empty());
    }
}
