//! UI-agnostic conversation types
//!
//! These are shared by the store, the API client and the terminal UI, and
//! don't depend on any specific UI framework.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single turn in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Who sent a message. Serialized lowercase, matching the chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered sequence of messages. Sequence index is the only ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        // just pushed, so never empty
        &self.messages[self.messages.len() - 1]
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// History as it would be sent with one more user message appended,
    /// without touching the conversation itself.
    pub fn with_pending(&self, prompt: &str) -> Vec<Message> {
        let mut messages = self.messages.clone();
        messages.push(Message::user(prompt));
        messages
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_role_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi there")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi there"}"#);
    }

    #[test]
    fn test_conversation_serializes_as_plain_array() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("hello"));
        conversation.push(Message::system("be brief"));

        let json = serde_json::to_string(&conversation).unwrap();
        assert_eq!(
            json,
            r#"[{"role":"user","content":"hello"},{"role":"system","content":"be brief"}]"#
        );
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result: Result<Message, _> =
            serde_json::from_str(r#"{"role":"tool","content":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_with_pending_leaves_conversation_untouched() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("first"));
        conversation.push(Message::assistant("reply"));

        let outgoing = conversation.with_pending("second");

        assert_eq!(conversation.len(), 2);
        assert_eq!(outgoing.len(), 3);
        assert_eq!(outgoing[2], Message::user("second"));
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::User, Role::Assistant, Role::System] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("User"), None);
    }
}
