//! Request pipeline: directory → selector → orchestrator → composer.

use std::sync::Arc;
use std::time::Duration;

use bitte_common::{AgentDescriptor, BitteError, ChatTurn, FailureKind, JobResult, Result};
use bitte_llm::{ChatBackend, OpenAiCompatibleBackend};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::composer::{ComposedReply, ResponseComposer};
use crate::config::{CoordinatorConfig, FallbackStrategy};
use crate::directory::AgentDirectory;
use crate::orchestrator::JobOrchestrator;
use crate::selector::AgentSelector;

/// Inbound chat request, in the front-end's field naming.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,

    /// Bypasses keyword selection when it names a listed agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<&str> {
        let last = self
            .messages
            .last()
            .ok_or_else(|| BitteError::InvalidRequest("messages must not be empty".into()))?;
        if last.content.trim().is_empty() {
            return Err(BitteError::InvalidRequest(
                "latest message has no content".into(),
            ));
        }
        Ok(&last.content)
    }
}

/// Handles one chat request end to end. Holds no per-request state, so a
/// single instance is shared by all concurrent requests.
pub struct Coordinator {
    directory: AgentDirectory,
    selector: AgentSelector,
    orchestrator: JobOrchestrator,
    composer: ResponseComposer,
}

impl Coordinator {
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| BitteError::Config(e.to_string()))?;

        info!(
            registries = config.directory.registries.len(),
            fallback = ?config.composer.fallback,
            schema_policy = ?config.orchestrator.schema_policy,
            "Initializing coordinator"
        );

        let backend: Option<Arc<dyn ChatBackend>> = match config.composer.fallback {
            FallbackStrategy::ChatBackend => {
                let backend_config = &config.fallback_backend;
                Some(Arc::new(OpenAiCompatibleBackend::new(
                    backend_config.url.clone(),
                    backend_config.resolve_api_key(),
                    Duration::from_millis(backend_config.timeout_ms),
                )))
            }
            FallbackStrategy::Canned => None,
        };

        Ok(Self::from_parts(
            AgentDirectory::new(config.directory.clone()),
            AgentSelector::new(&config.selector),
            JobOrchestrator::new(config.orchestrator.clone()),
            ResponseComposer::new(
                config.composer.clone(),
                backend,
                config.fallback_backend.default_model.clone(),
            ),
        ))
    }

    pub fn from_parts(
        directory: AgentDirectory,
        selector: AgentSelector,
        orchestrator: JobOrchestrator,
        composer: ResponseComposer,
    ) -> Self {
        Self {
            directory,
            selector,
            orchestrator,
            composer,
        }
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    pub fn composer(&self) -> &ResponseComposer {
        &self.composer
    }

    /// Process a chat request. Agent failures are answered by the composer's
    /// fallback; only invalid requests and cancellation are errors.
    ///
    /// Turns with non-conversational roles are dropped before anything else.
    pub async fn process(&self, mut request: ChatRequest, cancel: &CancellationToken) -> Result<ComposedReply> {
        request.messages.retain(|turn| turn.role.is_conversational());
        let message = request.validate()?;

        info!(
            messages = request.messages.len(),
            selected_model = ?request.selected_model,
            chat_id = ?request.chat_id,
            agent_id = ?request.agent_id,
            content_preview = %message.chars().take(50).collect::<String>(),
            "Processing chat request"
        );

        let agents = self.directory.list_agents().await;
        let result = match self.choose(&request, message, &agents) {
            Some(agent) => self.orchestrator.run_job(agent, &request.messages, cancel).await,
            None => {
                warn!("Directory is empty, no agent to route to");
                JobResult::failure("none", FailureKind::Unavailable, "No agents available")
            }
        };

        if cancel.is_cancelled()
            || matches!(result, JobResult::Failure { kind: FailureKind::Cancelled, .. })
        {
            info!("Chat request cancelled by caller");
            return Err(BitteError::Cancelled);
        }

        let reply = self
            .composer
            .compose(&result, &request.messages, request.selected_model.as_deref())
            .await;
        debug!(agent = %reply.agent, network = %reply.network, "Reply composed");
        Ok(reply)
    }

    fn choose<'a>(
        &self,
        request: &ChatRequest,
        message: &str,
        agents: &'a [AgentDescriptor],
    ) -> Option<&'a AgentDescriptor> {
        if let Some(ref agent_id) = request.agent_id {
            if let Some(selection) = self.selector.requested(agent_id, agents) {
                info!(agent = %selection.agent.id, "Using requested agent");
                return Some(selection.agent);
            }
            warn!(agent_id = %agent_id, "Requested agent not in directory, selecting by keyword");
        }

        let selection = self.selector.select_with_reason(message, agents)?;
        info!(agent = %selection.agent.id, reason = ?selection.reason, "Selected agent");
        Some(selection.agent)
    }
}
