//! Vitrina Delivery - best-effort outbound messaging
//!
//! The core hands a recipient and an [`Outgoing`] message to a
//! [`Delivery`] implementation and gets back a success flag. Delivery is
//! fire-and-forget relative to ledger mutations: a mutation is durable
//! once persisted regardless of delivery outcome, but the confirmation
//! handshake re-checks the flag so undelivered prompts can be retried.
//!
//! Oversized text is chunked into ordered parts; a failure on any part
//! after the first is not rolled back (partial delivery is accepted).

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vitrina_types::{ButtonAction, ChatId};

pub use mock::MockDelivery;

/// Chat platforms cap message length; longer text is split into parts
pub const MAX_MESSAGE_LEN: usize = 4000;

/// A button: localized label plus the typed action it triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: ButtonAction) -> Self {
        Self { label: label.into(), action }
    }
}

/// Rows of buttons shown under a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// One button per row, in order
    pub fn single_column(buttons: Vec<Button>) -> Self {
        Self { rows: buttons.into_iter().map(|b| vec![b]).collect() }
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An outbound message: text plus an optional keyboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outgoing {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Outgoing {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: None }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self { text: text.into(), keyboard: Some(keyboard) }
    }
}

/// Outbound delivery seam
///
/// Implementations must chunk oversized text with [`split_text`] and
/// deliver the parts in order, attaching the keyboard to the first part
/// only. Returns false when nothing could be delivered.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send(&self, recipient: ChatId, message: Outgoing) -> bool;
}

/// Split `text` into parts of at most `max_len` characters, preferring a
/// newline boundary, then a space, then a hard cut.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.chars().count() <= max_len {
            parts.push(rest.to_string());
            break;
        }

        // byte offset of the character budget
        let window_end = rest
            .char_indices()
            .nth(max_len)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];

        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .unwrap_or(window_end);
        // a leading separator would produce an empty part
        let split_at = if split_at == 0 { window_end } else { split_at };

        parts.push(rest[..split_at].to_string());
        rest = rest[split_at..].trim_start_matches(['\n', ' ']);
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_part() {
        assert_eq!(split_text("hello", 4000), vec!["hello".to_string()]);
    }

    #[test]
    fn splits_on_newline_first() {
        let text = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let parts = split_text(&text, 40);
        assert_eq!(parts, vec!["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn splits_on_space_when_no_newline() {
        let text = format!("{} {}", "a".repeat(30), "b".repeat(30));
        let parts = split_text(&text, 40);
        assert_eq!(parts, vec!["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn hard_cut_without_separators() {
        let text = "a".repeat(100);
        let parts = split_text(&text, 40);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 40);
        assert_eq!(parts[1].len(), 40);
        assert_eq!(parts[2].len(), 20);
    }

    #[test]
    fn parts_reassemble_in_order() {
        let text = (0..200).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let parts = split_text(&text, 100);
        assert!(parts.len() > 1);
        assert_eq!(parts.join("\n"), text);
    }
}
