//! Message Retention
//!
//! Periodic sweep that drops stored messages older than the retention
//! horizon. Hidden-message sets and offline-queue references that point
//! at swept messages are purged in the same pass so no index ever
//! outlives its message.

use std::collections::HashSet;
use std::time::Duration;

use tracing::info;

use trunkline_core::now_ms;

use super::Exchange;

impl Exchange {
    /// Removes every message whose timestamp fell behind the horizon.
    /// Returns how many were swept.
    pub fn sweep_expired(&mut self, horizon: Duration) -> usize {
        let cutoff = now_ms().saturating_sub(horizon.as_millis() as u64);

        let mut swept: HashSet<String> = HashSet::new();
        for log in self.conversations.values_mut() {
            log.retain(|message| {
                if message.timestamp_ms > cutoff {
                    true
                } else {
                    swept.insert(message.id.clone());
                    false
                }
            });
        }
        if swept.is_empty() {
            return 0;
        }

        let emptied: Vec<String> = self
            .conversations
            .iter()
            .filter(|(_, log)| log.is_empty())
            .map(|(key, _)| key.clone())
            .collect();
        for key in emptied {
            self.conversations.remove(&key);
        }

        for hidden in self.hidden.values_mut() {
            hidden.retain(|id| !swept.contains(id));
        }
        self.hidden.retain(|_, set| !set.is_empty());

        for queue in self.queued.values_mut() {
            queue.retain(|entry| !swept.contains(&entry.message_id));
        }
        self.queued.retain(|_, queue| !queue.is_empty());

        info!("Swept {} expired messages", swept.len());
        swept.len()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;
    use trunkline_core::ServerEvent;

    const ALI: &str = "+923001111111";
    const SARA: &str = "+923002222222";

    const DAY: Duration = Duration::from_secs(86_400);

    fn age_message(exchange: &mut Exchange, text: &str, by_ms: u64) {
        let message = exchange
            .conversations
            .values_mut()
            .flat_map(|log| log.iter_mut())
            .find(|m| m.text == text)
            .expect("stored message");
        message.timestamp_ms = message.timestamp_ms.saturating_sub(by_ms);
    }

    #[test]
    fn test_sweep_drops_only_expired_messages() {
        let mut exchange = Exchange::new();
        let mut a = register(&mut exchange, "Ali", ALI);
        let mut b = register(&mut exchange, "Sara", SARA);
        drain(&mut a);

        exchange.send_message(ALI, SARA, "old".into(), None, None);
        exchange.send_message(ALI, SARA, "new".into(), None, None);
        drain(&mut a);
        drain(&mut b);
        age_message(&mut exchange, "old", 2 * DAY.as_millis() as u64);

        assert_eq!(exchange.sweep_expired(DAY), 1);
        assert_eq!(exchange.message_count(), 1);

        exchange.load_messages(ALI, ALI, SARA, "r1".into());
        match next_event(&mut a) {
            ServerEvent::MessageHistory { messages, .. } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].text, "new");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_zero_horizon_sweeps_everything() {
        let mut exchange = Exchange::new();
        let mut a = register(&mut exchange, "Ali", ALI);
        let _b = register(&mut exchange, "Sara", SARA);
        drain(&mut a);

        exchange.send_message(ALI, SARA, "one".into(), None, None);
        exchange.send_message(ALI, SARA, "two".into(), None, None);

        assert_eq!(exchange.sweep_expired(Duration::ZERO), 2);
        assert_eq!(exchange.message_count(), 0);
        assert!(exchange.conversations.is_empty());
    }

    #[test]
    fn test_sweep_purges_hidden_references() {
        let mut exchange = Exchange::new();
        let mut a = register(&mut exchange, "Ali", ALI);
        let mut b = register(&mut exchange, "Sara", SARA);
        drain(&mut a);

        exchange.send_message(ALI, SARA, "ephemeral".into(), None, None);
        drain(&mut a);
        let id = match drain(&mut b).pop() {
            Some(ServerEvent::NewMessage(m)) => m.id,
            other => panic!("unexpected event: {other:?}"),
        };
        exchange.delete_message(SARA, &id, false);
        drain(&mut b);
        assert!(!exchange.hidden.is_empty());

        age_message(&mut exchange, "ephemeral", 2 * DAY.as_millis() as u64);
        assert_eq!(exchange.sweep_expired(DAY), 1);
        assert!(exchange.hidden.is_empty());
    }

    #[test]
    fn test_sweep_purges_queued_references() {
        let mut exchange = Exchange::new();
        let mut a = register(&mut exchange, "Ali", ALI);
        let conn_b = {
            let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
            exchange.register(None, "Sara".into(), SARA.into(), tx).unwrap()
        };
        exchange.disconnect(SARA, conn_b);
        drain(&mut a);

        exchange.send_message(ALI, SARA, "stale".into(), None, None);
        assert_eq!(exchange.queued_count(), 1);

        age_message(&mut exchange, "stale", 2 * DAY.as_millis() as u64);
        assert_eq!(exchange.sweep_expired(DAY), 1);
        assert_eq!(exchange.queued_count(), 0);

        // Reconnect flushes nothing
        let mut b = register_keep_events(&mut exchange, "Sara", SARA);
        match next_event(&mut b) {
            ServerEvent::RegistrationSuccess { .. } => {}
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(drain(&mut b)
            .iter()
            .all(|e| !matches!(e, ServerEvent::NewMessage(_))));
    }
}
