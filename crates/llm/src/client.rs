use async_trait::async_trait;
use bitte_common::{ChatTurn, MessageRole, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl From<MessageRole> for Role {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::System | MessageRole::Other => Role::System,
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&ChatTurn> for ChatMessage {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role.into(),
            content: turn.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    /// `None` when the backend answered without any choice content
    pub content: Option<String>,
    pub model: String,
}

/// A general-purpose chat service used when no agent could answer.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>, model: &str) -> Result<ChatReply>;
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_from_turn() {
        let turn = ChatTurn::assistant("Staking is live");
        let msg = ChatMessage::from(&turn);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "Staking is live");
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
