//! In-memory delivery used by tests
//!
//! Records every message it is asked to deliver and can be told to fail
//! for specific recipients, which is how the confirmation handshake's
//! delivery-failure paths get exercised.

use crate::{split_text, Delivery, Outgoing, MAX_MESSAGE_LEN};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use vitrina_types::ChatId;

/// Recorded delivery, one entry per chunk
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub recipient: ChatId,
    pub message: Outgoing,
}

#[derive(Debug, Default)]
pub struct MockDelivery {
    sent: Mutex<Vec<Sent>>,
    failing: Mutex<HashSet<i64>>,
}

impl MockDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// All deliveries after `fail_for` to this recipient report failure
    pub fn fail_for(&self, recipient: ChatId) {
        self.failing.lock().unwrap().insert(recipient.as_i64());
    }

    pub fn restore(&self, recipient: ChatId) {
        self.failing.lock().unwrap().remove(&recipient.as_i64());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, recipient: ChatId) -> Vec<Outgoing> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.recipient == recipient)
            .map(|s| s.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Delivery for MockDelivery {
    async fn send(&self, recipient: ChatId, message: Outgoing) -> bool {
        if self.failing.lock().unwrap().contains(&recipient.as_i64()) {
            tracing::debug!(chat_id = recipient.as_i64(), "mock delivery failure");
            return false;
        }

        let parts = split_text(&message.text, MAX_MESSAGE_LEN);
        let mut sent = self.sent.lock().unwrap();
        for (i, part) in parts.into_iter().enumerate() {
            sent.push(Sent {
                recipient,
                message: Outgoing {
                    text: part,
                    keyboard: if i == 0 { message.keyboard.clone() } else { None },
                },
            });
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_deliveries() {
        let delivery = MockDelivery::new();
        let chat = ChatId(42);
        assert!(delivery.send(chat, Outgoing::text("hi")).await);
        let sent = delivery.sent_to(chat);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "hi");
    }

    #[tokio::test]
    async fn failing_recipient_reports_false_and_records_nothing() {
        let delivery = MockDelivery::new();
        let chat = ChatId(7);
        delivery.fail_for(chat);
        assert!(!delivery.send(chat, Outgoing::text("hi")).await);
        assert!(delivery.sent_to(chat).is_empty());

        delivery.restore(chat);
        assert!(delivery.send(chat, Outgoing::text("hi")).await);
        assert_eq!(delivery.sent_to(chat).len(), 1);
    }

    #[tokio::test]
    async fn long_text_is_chunked_with_keyboard_on_first_part() {
        let delivery = MockDelivery::new();
        let chat = ChatId(1);
        let keyboard = crate::Keyboard::new().row(vec![]);
        let text = "x".repeat(MAX_MESSAGE_LEN + 10);
        assert!(delivery.send(chat, Outgoing::with_keyboard(text, keyboard.clone())).await);

        let sent = delivery.sent_to(chat);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].keyboard, Some(keyboard));
        assert_eq!(sent[1].keyboard, None);
    }
}
