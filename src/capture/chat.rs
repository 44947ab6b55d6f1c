//! Chat message collection with duplicate and noise suppression.
//!
//! Each chat mutation batch re-reads only the last rendered message, and the
//! host page fires many batches per message as it decorates the entry with
//! interactive buttons. Later observations of the same message are supersets
//! of earlier ones, so novelty is decided by a substring check rather than
//! equality.

use regex::Regex;
use tracing::debug;

use super::types::{now_iso8601, ChatMessage};

/// Trailing interactive-button labels the host page appends to the rendered
/// message text.
const TRAILING_ARTIFACTS: &str = r"\s*(?:Pin message|Unpin message|Pinned)\s*$";

pub struct ChatCollector {
    self_label: String,
    self_name: String,
    artifacts: Regex,
    messages: Vec<ChatMessage>,
}

impl ChatCollector {
    pub fn new(self_label: &str) -> Self {
        Self {
            self_label: self_label.to_string(),
            self_name: self_label.to_string(),
            // The pattern is a checked constant.
            artifacts: Regex::new(TRAILING_ARTIFACTS).unwrap(),
            messages: Vec::new(),
        }
    }

    pub fn set_self_name(&mut self, name: &str) {
        self.self_name = name.to_string();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Offer one observed candidate. Returns true when it was appended as a
    /// genuinely new message.
    pub fn offer(&mut self, person_name: &str, raw_text: &str) -> bool {
        let person_name = if person_name == self.self_label {
            self.self_name.as_str()
        } else {
            person_name
        };

        // A candidate whose raw text contains an already-stored message from
        // the same sender is a re-render of that message, not a new one.
        let duplicate = self.messages.iter().any(|existing| {
            existing.person_name == person_name && raw_text.contains(&existing.chat_message_text)
        });
        if duplicate {
            return false;
        }

        let text = self.artifacts.replace(raw_text, "").to_string();
        if text.is_empty() {
            return false;
        }

        let message = ChatMessage {
            person_name: person_name.to_string(),
            timestamp: now_iso8601(),
            chat_message_text: text,
        };
        debug!("New chat message from {}", message.person_name);
        self.messages.push(message);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_message_is_kept() {
        let mut chat = ChatCollector::new("You");
        assert!(chat.offer("Alice", "Hello world"));
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].chat_message_text, "Hello world");
    }

    #[test]
    fn test_superset_rerender_is_dropped() {
        let mut chat = ChatCollector::new("You");
        assert!(chat.offer("Alice", "Hello world"));
        // Same message re-rendered with the pin button appended
        assert!(!chat.offer("Alice", "Hello worldPin message"));
        assert_eq!(chat.messages().len(), 1);
    }

    #[test]
    fn test_artifact_stripped_before_storage() {
        let mut chat = ChatCollector::new("You");
        assert!(chat.offer("Alice", "Hello world Pin message"));
        assert_eq!(chat.messages()[0].chat_message_text, "Hello world");
        // The bare re-render now matches the stored text and is dropped
        assert!(!chat.offer("Alice", "Hello world"));
    }

    #[test]
    fn test_same_text_different_sender_both_kept() {
        let mut chat = ChatCollector::new("You");
        assert!(chat.offer("Alice", "+1"));
        assert!(chat.offer("Bob", "+1"));
        assert_eq!(chat.messages().len(), 2);
    }

    #[test]
    fn test_distinct_messages_same_sender_kept() {
        let mut chat = ChatCollector::new("You");
        assert!(chat.offer("Alice", "first thought"));
        assert!(chat.offer("Alice", "second thought"));
        assert_eq!(chat.messages().len(), 2);
    }

    #[test]
    fn test_self_label_substituted_at_creation() {
        let mut chat = ChatCollector::new("You");
        chat.set_self_name("Dana");
        assert!(chat.offer("You", "my message"));
        assert_eq!(chat.messages()[0].person_name, "Dana");
    }

    #[test]
    fn test_self_substitution_feeds_dedup() {
        let mut chat = ChatCollector::new("You");
        chat.set_self_name("Dana");
        assert!(chat.offer("You", "hello"));
        // Re-render of the same self message still dedups after substitution
        assert!(!chat.offer("You", "helloPin message"));
    }

    #[test]
    fn test_artifact_only_text_is_ignored() {
        let mut chat = ChatCollector::new("You");
        assert!(!chat.offer("Alice", "Pin message"));
        assert!(chat.messages().is_empty());
    }
}
