//! Conversation turns exchanged with the chat front-end.

use serde::{Deserialize, Serialize};

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    /// `data`, `tool`, `function` and any other role the front-end sends
    #[serde(other)]
    Other,
}

impl MessageRole {
    /// User, assistant and system turns; everything else is front-end bookkeeping.
    pub fn is_conversational(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// One message of the conversation, as posted by the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,

    pub content: String,

    /// Unix millis or an ISO-8601 string, kept opaque. Only the front-end
    /// uses it, to sort its history.
    #[serde(
        default,
        rename = "createdAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<serde_json::Value>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            created_at: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            created_at: None,
        }
    }
}

/// The last `window` turns of a conversation (all of them if shorter).
pub fn trailing_window(turns: &[ChatTurn], window: usize) -> &[ChatTurn] {
    &turns[turns.len().saturating_sub(window)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_deserializes_front_end_shape() {
        let json = r#"{"role": "user", "content": "gm", "createdAt": 1718000000000}"#;
        let turn: ChatTurn = serde_json::from_str(json).unwrap();
        assert_eq!(turn.role, MessageRole::User);
        assert_eq!(turn.content, "gm");
        assert_eq!(turn.created_at, Some(serde_json::json!(1_718_000_000_000i64)));
    }

    #[test]
    fn test_turn_accepts_iso_timestamp() {
        let json = r#"{"role": "user", "content": "gm", "createdAt": "2024-06-10T12:00:00.000Z"}"#;
        let turn: ChatTurn = serde_json::from_str(json).unwrap();
        assert_eq!(turn.created_at, Some(serde_json::json!("2024-06-10T12:00:00.000Z")));
    }

    #[test]
    fn test_unknown_roles_are_not_conversational() {
        for role in ["data", "tool", "function"] {
            let json = format!(r#"{{"role": "{role}", "content": "{{}}"}}"#);
            let turn: ChatTurn = serde_json::from_str(&json).unwrap();
            assert_eq!(turn.role, MessageRole::Other);
            assert!(!turn.role.is_conversational());
        }
        assert!(MessageRole::Assistant.is_conversational());
    }

    #[test]
    fn test_turn_without_timestamp() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role": "assistant", "content": "hi"}"#).unwrap();
        assert!(turn.created_at.is_none());
        let json = serde_json::to_string(&turn).unwrap();
        assert!(!json.contains("createdAt"));
    }

    #[test]
    fn test_trailing_window() {
        let turns: Vec<ChatTurn> = (0..5).map(|i| ChatTurn::user(format!("m{i}"))).collect();
        let window = trailing_window(&turns, 3);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].content, "m2");
        assert_eq!(window[2].content, "m4");

        assert_eq!(trailing_window(&turns[..2], 3).len(), 2);
        assert!(trailing_window(&[], 3).is_empty());
    }
}
