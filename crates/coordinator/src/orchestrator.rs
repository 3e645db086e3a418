//! Drives one job through a remote agent: availability, input schema,
//! submission and polling until a terminal status or the attempt ceiling.

use std::future::Future;
use std::sync::Arc;

use bitte_common::{
    AgentDescriptor, BitteError, ChatTurn, FailureKind, JobHandle, JobResult, JobStatus, Result,
    trailing_window,
};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{OrchestratorConfig, SchemaPolicy};
use crate::protocol::{AdapterSet, AgentProtocolAdapter, HttpJobAdapter, InputField, ProtocolTimeouts};

pub struct JobOrchestrator {
    adapters: AdapterSet,
    config: OrchestratorConfig,
}

impl JobOrchestrator {
    /// Orchestrator speaking the HTTP job protocol to every network.
    pub fn new(config: OrchestratorConfig) -> Self {
        let http: Arc<dyn AgentProtocolAdapter> =
            Arc::new(HttpJobAdapter::new(ProtocolTimeouts::from(&config)));
        Self::with_adapters(config, AdapterSet::new(http))
    }

    pub fn with_adapters(config: OrchestratorConfig, adapters: AdapterSet) -> Self {
        Self { adapters, config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one job against `agent`. Never fails: every error becomes a
    /// [`JobResult::Failure`] tagged with the agent's name.
    pub async fn run_job(
        &self,
        agent: &AgentDescriptor,
        turns: &[ChatTurn],
        cancel: &CancellationToken,
    ) -> JobResult {
        match self.drive(agent, turns, cancel).await {
            Ok(handle) => {
                info!(
                    agent = %agent.id,
                    job_id = %handle.job_id,
                    attempts = handle.attempts(),
                    "Job completed"
                );
                JobResult::Success {
                    text: handle.result_text,
                    agent_name: agent.name.clone(),
                    job_id: handle.job_id,
                    payment_id: handle.payment_id,
                    network: agent.network,
                }
            }
            Err(e) => {
                let result = failure_from_error(agent, e);
                if let JobResult::Failure { reason, kind, .. } = &result {
                    warn!(agent = %agent.id, kind = ?kind, reason = %reason, "Job failed");
                }
                result
            }
        }
    }

    async fn drive(
        &self,
        agent: &AgentDescriptor,
        turns: &[ChatTurn],
        cancel: &CancellationToken,
    ) -> Result<JobHandle> {
        let adapter = self.adapters.for_network(agent.network);

        let message = turns
            .last()
            .map(|turn| turn.content.as_str())
            .ok_or_else(|| BitteError::InvalidRequest("conversation has no messages".into()))?;

        cancellable(cancel, adapter.probe_availability(agent)).await?;
        debug!(agent = %agent.id, "Agent available");

        let schema = match cancellable(cancel, adapter.fetch_schema(agent)).await {
            Ok(schema) => Some(schema),
            Err(BitteError::Cancelled) => return Err(BitteError::Cancelled),
            Err(e) if self.config.schema_policy == SchemaPolicy::Required => {
                return Err(match e {
                    BitteError::SchemaFetchFailed(_)
                    | BitteError::NetworkTimeout(_)
                    | BitteError::MalformedResponse(_) => e,
                    other => BitteError::SchemaFetchFailed(other.to_string()),
                });
            }
            Err(e) => {
                warn!(
                    agent = %agent.id,
                    error = %e,
                    "Input schema unavailable, submitting default payload"
                );
                None
            }
        };

        let context = serde_json::to_string(trailing_window(turns, self.config.context_window))?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let input = build_input(message, &context, &agent.id, &timestamp, schema.as_ref());

        let submission = cancellable(cancel, adapter.submit_job(agent, &input)).await?;
        info!(
            agent = %agent.id,
            job_id = %submission.job_id,
            payment_id = ?submission.payment_id,
            "Job started"
        );

        let mut handle = JobHandle::new(
            submission.job_id,
            submission.payment_id,
            self.config.max_poll_attempts,
        );
        let interval = self.config.poll_interval();

        while handle.can_poll() {
            if cancel.is_cancelled() {
                return Err(BitteError::Cancelled);
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(BitteError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }

            let report = cancellable(cancel, adapter.poll_status(agent, &handle.job_id)).await?;
            handle.record_poll(report.status, report.result);
            debug!(
                agent = %agent.id,
                job_id = %handle.job_id,
                attempt = handle.attempts(),
                status = %handle.status,
                "Polled job status"
            );
        }

        match handle.status {
            JobStatus::Completed => Ok(handle),
            JobStatus::Failed => Err(BitteError::PollingFailedStatus {
                status: handle.status.to_string(),
                partial: handle.result_text,
            }),
            _ => Err(BitteError::PollingTimedOut {
                attempts: handle.attempts(),
                last_status: handle.status.to_string(),
                partial: handle.result_text,
            }),
        }
    }
}

async fn cancellable<T>(cancel: &CancellationToken, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BitteError::Cancelled),
        result = call => result,
    }
}

/// Map an orchestration error onto the failure the caller sees.
pub fn failure_from_error(agent: &AgentDescriptor, error: BitteError) -> JobResult {
    let name = agent.name.clone();
    match error {
        BitteError::AgentUnavailable { .. } => {
            JobResult::failure(name, FailureKind::Unavailable, error.to_string())
        }
        BitteError::SchemaFetchFailed(_) => {
            JobResult::failure(name, FailureKind::SchemaFetch, error.to_string())
        }
        BitteError::SubmissionFailed(_) => {
            JobResult::failure(name, FailureKind::Submission, error.to_string())
        }
        BitteError::PollingTimedOut { .. } => {
            JobResult::failure(name, FailureKind::PollingTimedOut, error.to_string())
        }
        BitteError::PollingFailedStatus { .. } => {
            JobResult::failure(name, FailureKind::PollingFailed, error.to_string())
        }
        BitteError::NetworkTimeout(_) => {
            let reason = format!("Agent {name} is unreachable (timeout)");
            JobResult::failure(name, FailureKind::Unreachable, reason)
        }
        BitteError::MalformedResponse(detail) => {
            let reason = format!("Agent {name} is unreachable (malformed response: {detail})");
            JobResult::failure(name, FailureKind::Unreachable, reason)
        }
        BitteError::Cancelled => JobResult::failure(name, FailureKind::Cancelled, "request cancelled"),
        other => JobResult::failure(name, FailureKind::Network, other.to_string()),
    }
}

/// Field ids declared by an input schema's `input_data` list.
fn declared_fields(schema: &Value) -> Vec<&str> {
    schema
        .get("input_data")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|field| {
                    ["id", "key", "name"]
                        .iter()
                        .find_map(|k| field.get(*k).and_then(Value::as_str))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Build the `input_data` entries for a submission.
///
/// Without a usable schema the four standard entries are sent. A schema that
/// declares field ids limits the payload to declared keys, and if it does not
/// declare `text` the message goes to its first non-standard field. With no
/// such field the `text` entry is kept so the message is always sent.
pub fn build_input(
    message: &str,
    context: &str,
    agent_id: &str,
    timestamp: &str,
    schema: Option<&Value>,
) -> Vec<InputField> {
    let standard = vec![
        InputField::new("text", message),
        InputField::new("context", context),
        InputField::new("agent_type", agent_id),
        InputField::new("timestamp", timestamp),
    ];

    let declared = schema.map(declared_fields).unwrap_or_default();
    if declared.is_empty() {
        return standard;
    }

    let mut input: Vec<InputField> = standard
        .into_iter()
        .filter(|field| declared.contains(&field.key.as_str()))
        .collect();

    if !declared.contains(&"text") {
        let standard_keys = ["text", "context", "agent_type", "timestamp"];
        let target = declared
            .iter()
            .find(|id| !standard_keys.contains(id))
            .copied()
            .unwrap_or("text");
        input.insert(0, InputField::new(target, message));
    }

    input
}
