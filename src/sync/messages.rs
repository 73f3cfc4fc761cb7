#[cfg(test)]
#[path = "messages_test.rs"]
mod messages_test;

use std::collections::HashMap;

use crate::common::ChatMessage;

/// Accumulates the messages of one room with set semantics keyed by id.
///
/// Arrival order is irrelevant: history rows and live inserts land in the
/// same set, and a message that arrives through both paths (fetch racing
/// the live echo) is held once.
#[derive(Debug, Default)]
pub struct MessageSet {
    by_id: HashMap<String, ChatMessage>,
}

impl MessageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one message. Returns `false` (and changes nothing) when a
    /// message with the same id is already held.
    pub fn insert(&mut self, message: ChatMessage) -> bool {
        if self.by_id.contains_key(&message.id) {
            return false;
        }
        self.by_id.insert(message.id.clone(), message);
        true
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// The display-ready sequence: ascending by creation timestamp (the
    /// ISO-8601 strings are fixed-width, so lexical order is time order),
    /// ties broken by id so equal timestamps render in a stable order.
    pub fn ordered(&self) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = self.by_id.values().cloned().collect();
        messages.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        messages
    }
}
