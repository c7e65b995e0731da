//! Console chat adapter
//!
//! Stands in for a chat platform: outbound messages are printed to
//! stdout, keyboards are rendered as numbered buttons, and inbound text
//! that matches a rendered button label (or its number) is mapped back
//! to the typed action the button was created with. The core never sees
//! labels.

use async_trait::async_trait;
use dashmap::DashMap;
use vitrina_delivery::{split_text, Button, Delivery, Outgoing, MAX_MESSAGE_LEN};
use vitrina_types::{ButtonAction, ChatId};

pub struct ConsoleChat {
    /// Last keyboard rendered per chat, flattened in display order
    keyboards: DashMap<i64, Vec<Button>>,
}

impl ConsoleChat {
    pub fn new() -> Self {
        Self { keyboards: DashMap::new() }
    }

    /// Map inbound text back to the button it was rendered as, if any
    pub fn action_for(&self, chat_id: ChatId, input: &str) -> Option<ButtonAction> {
        let buttons = self.keyboards.get(&chat_id.as_i64())?;
        let input = input.trim();

        if let Ok(number) = input.parse::<usize>() {
            if let Some(button) = number.checked_sub(1).and_then(|i| buttons.get(i)) {
                return Some(button.action.clone());
            }
        }
        buttons
            .iter()
            .find(|b| b.label.eq_ignore_ascii_case(input))
            .map(|b| b.action.clone())
    }
}

#[async_trait]
impl Delivery for ConsoleChat {
    async fn send(&self, recipient: ChatId, message: Outgoing) -> bool {
        for part in split_text(&message.text, MAX_MESSAGE_LEN) {
            println!("[{}] {}", recipient.as_i64(), part);
        }

        match message.keyboard {
            Some(keyboard) => {
                let buttons: Vec<Button> = keyboard.rows.into_iter().flatten().collect();
                for (i, button) in buttons.iter().enumerate() {
                    println!("[{}]   {}. {}", recipient.as_i64(), i + 1, button.label);
                }
                self.keyboards.insert(recipient.as_i64(), buttons);
            }
            None => {
                self.keyboards.remove(&recipient.as_i64());
            }
        }
        true
    }
}

/// An inbound console line: `<chat_id>[:<username>] <text>`
pub struct Inbound {
    pub chat_id: ChatId,
    pub username: String,
    pub text: String,
}

pub fn parse_line(line: &str) -> Option<Inbound> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (head, text) = line.split_once(char::is_whitespace)?;
    let (id, username) = match head.split_once(':') {
        Some((id, username)) => (id, username),
        None => (head, ""),
    };
    let chat_id = id.parse::<i64>().ok()?;

    Some(Inbound {
        chat_id: ChatId(chat_id),
        username: username.to_string(),
        text: text.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrina_delivery::Keyboard;
    use vitrina_types::MenuCommand;

    #[test]
    fn parses_chat_id_username_and_text() {
        let inbound = parse_line("42:shop-a some text here").unwrap();
        assert_eq!(inbound.chat_id, ChatId(42));
        assert_eq!(inbound.username, "shop-a");
        assert_eq!(inbound.text, "some text here");

        let inbound = parse_line("7 /start").unwrap();
        assert_eq!(inbound.chat_id, ChatId(7));
        assert_eq!(inbound.username, "");
        assert_eq!(inbound.text, "/start");

        assert!(parse_line("").is_none());
        assert!(parse_line("not-a-number hello").is_none());
    }

    #[tokio::test]
    async fn button_presses_map_back_to_their_action() {
        let chat = ConsoleChat::new();
        let keyboard = Keyboard::single_column(vec![
            Button::new("Products", ButtonAction::Menu(MenuCommand::Products)),
            Button::new("Reports", ButtonAction::Menu(MenuCommand::Reports)),
        ]);
        chat.send(ChatId(1), Outgoing::with_keyboard("menu", keyboard)).await;

        assert_eq!(
            chat.action_for(ChatId(1), "Reports"),
            Some(ButtonAction::Menu(MenuCommand::Reports))
        );
        assert_eq!(
            chat.action_for(ChatId(1), "1"),
            Some(ButtonAction::Menu(MenuCommand::Products))
        );
        assert_eq!(chat.action_for(ChatId(1), "nope"), None);
        assert_eq!(chat.action_for(ChatId(2), "Reports"), None);

        // a plain-text reply clears the keyboard
        chat.send(ChatId(1), Outgoing::text("done")).await;
        assert_eq!(chat.action_for(ChatId(1), "Reports"), None);
    }
}
