//! Turns a job outcome into the single reply sent back to the caller.

use std::sync::Arc;

use bitte_common::{ChatTurn, JobResult};
use bitte_llm::{ChatBackend, ChatMessage};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ComposerConfig, FallbackStrategy};

pub const FALLBACK_AGENT: &str = "Telegram-Bitte";
pub const FALLBACK_NETWORK: &str = "fallback";
const BACKEND_EMPTY_REPLY: &str = "Sorry, I could not process your request.";

/// Final reply, serialized as the chat endpoint's response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedReply {
    #[serde(rename = "response")]
    pub text: String,
    pub agent: String,
    pub network: String,
}

pub struct ResponseComposer {
    config: ComposerConfig,
    backend: Option<Arc<dyn ChatBackend>>,
    default_model: String,
}

impl ResponseComposer {
    pub fn new(config: ComposerConfig, backend: Option<Arc<dyn ChatBackend>>, default_model: impl Into<String>) -> Self {
        if config.fallback == FallbackStrategy::ChatBackend && backend.is_none() {
            warn!("Chat backend fallback selected but no backend configured");
        }
        Self {
            config,
            backend,
            default_model: default_model.into(),
        }
    }

    pub fn footer(&self) -> &str {
        &self.config.footer
    }

    pub fn strategy(&self) -> FallbackStrategy {
        self.config.fallback
    }

    fn with_footer(&self, text: &str) -> String {
        format!("{}{}", text, self.config.footer)
    }

    /// Compose the reply for `result`. On failure the configured fallback
    /// strategy alone decides the text; the footer is always appended.
    pub async fn compose(
        &self,
        result: &JobResult,
        fallback_turns: &[ChatTurn],
        model: Option<&str>,
    ) -> ComposedReply {
        match result {
            JobResult::Success {
                text,
                agent_name,
                network,
                ..
            } => ComposedReply {
                text: self.with_footer(text),
                agent: agent_name.clone(),
                network: network.label().to_string(),
            },
            JobResult::Failure {
                reason,
                agent_name,
                kind,
            } => {
                info!(
                    agent = %agent_name,
                    kind = ?kind,
                    reason = %reason,
                    strategy = ?self.config.fallback,
                    "Composing fallback reply"
                );
                let text = match self.config.fallback {
                    FallbackStrategy::Canned => self.config.canned_message.clone(),
                    FallbackStrategy::ChatBackend => self.ask_backend(fallback_turns, model).await,
                };
                ComposedReply {
                    text: self.with_footer(&text),
                    agent: FALLBACK_AGENT.to_string(),
                    network: FALLBACK_NETWORK.to_string(),
                }
            }
        }
    }

    async fn ask_backend(&self, turns: &[ChatTurn], model: Option<&str>) -> String {
        let Some(backend) = &self.backend else {
            return BACKEND_EMPTY_REPLY.to_string();
        };

        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(self.default_model.as_str());
        let messages: Vec<ChatMessage> = turns.iter().map(ChatMessage::from).collect();

        match backend.chat(messages, model).await {
            Ok(reply) => reply
                .content
                .unwrap_or_else(|| BACKEND_EMPTY_REPLY.to_string()),
            Err(e) => {
                warn!(backend = backend.name(), error = %e, "Chat backend failed");
                BACKEND_EMPTY_REPLY.to_string()
            }
        }
    }
}
