//! Remote agent job protocol.
//!
//! The orchestrator drives agents through [`AgentProtocolAdapter`]; which
//! adapter is used is decided per agent by its network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bitte_common::{AgentDescriptor, AgentNetwork, BitteError, JobStatus, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::OrchestratorConfig;

/// One `{key, value}` entry of a job's `input_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    pub key: String,
    pub value: String,
}

impl InputField {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSubmission {
    pub job_id: String,
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: JobStatus,
    pub result: String,
}

/// The four calls a remote agent must answer.
#[async_trait]
pub trait AgentProtocolAdapter: Send + Sync {
    /// Succeeds only if the agent reports itself available.
    async fn probe_availability(&self, agent: &AgentDescriptor) -> Result<()>;

    async fn fetch_schema(&self, agent: &AgentDescriptor) -> Result<Value>;

    async fn submit_job(&self, agent: &AgentDescriptor, input: &[InputField]) -> Result<JobSubmission>;

    async fn poll_status(&self, agent: &AgentDescriptor, job_id: &str) -> Result<StatusReport>;
}

/// Adapters keyed by network, with one used for every unlisted network.
#[derive(Clone)]
pub struct AdapterSet {
    default: Arc<dyn AgentProtocolAdapter>,
    by_network: HashMap<AgentNetwork, Arc<dyn AgentProtocolAdapter>>,
}

impl AdapterSet {
    pub fn new(default: Arc<dyn AgentProtocolAdapter>) -> Self {
        Self {
            default,
            by_network: HashMap::new(),
        }
    }

    pub fn with_network(mut self, network: AgentNetwork, adapter: Arc<dyn AgentProtocolAdapter>) -> Self {
        self.by_network.insert(network, adapter);
        self
    }

    pub fn for_network(&self, network: AgentNetwork) -> Arc<dyn AgentProtocolAdapter> {
        self.by_network
            .get(&network)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProtocolTimeouts {
    pub availability: Duration,
    pub schema: Duration,
    pub submit: Duration,
    pub poll: Duration,
}

impl From<&OrchestratorConfig> for ProtocolTimeouts {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            availability: Duration::from_millis(config.availability_timeout_ms),
            schema: Duration::from_millis(config.schema_timeout_ms),
            submit: Duration::from_millis(config.submit_timeout_ms),
            poll: Duration::from_millis(config.poll_timeout_ms),
        }
    }
}

#[derive(Deserialize)]
struct AvailabilityBody {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Serialize)]
struct StartJobBody<'a> {
    input_data: &'a [InputField],
}

#[derive(Deserialize)]
struct StartJobResponse {
    #[serde(default)]
    job_id: Option<Value>,
    #[serde(default)]
    payment_id: Option<Value>,
}

#[derive(Deserialize)]
struct StatusBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

/// Identifiers may be strings or numbers on the wire.
fn id_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Result payloads may be any JSON value; non-strings are kept as JSON text.
pub fn result_text(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

fn transport_error(step: &str, agent: &AgentDescriptor, e: reqwest::Error) -> BitteError {
    if e.is_timeout() {
        BitteError::NetworkTimeout(format!("{step} for {}", agent.name))
    } else if e.is_decode() {
        BitteError::MalformedResponse(format!("{step} for {}: {e}", agent.name))
    } else {
        BitteError::Network(format!("{step} for {}: {e}", agent.name))
    }
}

/// The HTTP job protocol spoken by Masumi and Shade agents.
pub struct HttpJobAdapter {
    http_client: reqwest::Client,
    timeouts: ProtocolTimeouts,
}

impl HttpJobAdapter {
    pub fn new(timeouts: ProtocolTimeouts) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeouts,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        step: &str,
        agent: &AgentDescriptor,
        url: &str,
        timeout: Duration,
    ) -> Result<(reqwest::StatusCode, Option<T>)> {
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(step, agent, e))?;

        let status = response.status();
        if !status.is_success() {
            return Ok((status, None));
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| transport_error(step, agent, e))?;
        Ok((status, Some(body)))
    }
}

#[async_trait]
impl AgentProtocolAdapter for HttpJobAdapter {
    async fn probe_availability(&self, agent: &AgentDescriptor) -> Result<()> {
        let url = agent.endpoint("availability");
        let (status, body) = self
            .get_json::<AvailabilityBody>("availability check", agent, &url, self.timeouts.availability)
            .await?;

        let Some(body) = body else {
            return Err(BitteError::AgentUnavailable {
                agent: agent.name.clone(),
                detail: format!("HTTP {}", status.as_u16()),
            });
        };

        match body.status.as_deref() {
            Some("available") => Ok(()),
            other => Err(BitteError::AgentUnavailable {
                agent: agent.name.clone(),
                detail: format!("status: {}", other.unwrap_or("missing")),
            }),
        }
    }

    async fn fetch_schema(&self, agent: &AgentDescriptor) -> Result<Value> {
        let url = agent.endpoint("input_schema");
        let (status, body) = self
            .get_json::<Value>("input schema", agent, &url, self.timeouts.schema)
            .await?;
        body.ok_or_else(|| BitteError::SchemaFetchFailed(format!("HTTP {}", status.as_u16())))
    }

    async fn submit_job(&self, agent: &AgentDescriptor, input: &[InputField]) -> Result<JobSubmission> {
        let url = agent.endpoint("start_job");
        debug!(agent = %agent.id, fields = input.len(), "Submitting job");

        let response = self
            .http_client
            .post(&url)
            .timeout(self.timeouts.submit)
            .json(&StartJobBody { input_data: input })
            .send()
            .await
            .map_err(|e| transport_error("job start", agent, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BitteError::SubmissionFailed(format!("HTTP {}", status.as_u16())));
        }

        let body: StartJobResponse = response
            .json()
            .await
            .map_err(|e| transport_error("job start", agent, e))?;

        let job_id = id_text(body.job_id)
            .ok_or_else(|| BitteError::MalformedResponse("start_job response has no job_id".into()))?;

        Ok(JobSubmission {
            job_id,
            payment_id: id_text(body.payment_id),
        })
    }

    async fn poll_status(&self, agent: &AgentDescriptor, job_id: &str) -> Result<StatusReport> {
        let url = agent.endpoint("status");
        let response = self
            .http_client
            .get(&url)
            .query(&[("job_id", job_id)])
            .header("Accept", "application/json")
            .timeout(self.timeouts.poll)
            .send()
            .await
            .map_err(|e| transport_error("status check", agent, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BitteError::Network(format!(
                "status check for {} failed: HTTP {}",
                agent.name,
                status.as_u16()
            )));
        }

        let body: StatusBody = response
            .json()
            .await
            .map_err(|e| transport_error("status check", agent, e))?;

        let status = body
            .status
            .ok_or_else(|| BitteError::MalformedResponse("status response has no status".into()))?;

        Ok(StatusReport {
            status: JobStatus::from(status),
            result: result_text(body.result),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_text_accepts_strings_and_numbers() {
        assert_eq!(id_text(Some(json!("job-1"))).as_deref(), Some("job-1"));
        assert_eq!(id_text(Some(json!(42))).as_deref(), Some("42"));
        assert!(id_text(Some(json!(""))).is_none());
        assert!(id_text(Some(json!(null))).is_none());
        assert!(id_text(None).is_none());
    }

    #[test]
    fn test_result_text_normalization() {
        assert_eq!(result_text(None), "");
        assert_eq!(result_text(Some(json!(null))), "");
        assert_eq!(result_text(Some(json!("Staked 5 NEAR"))), "Staked 5 NEAR");
        assert_eq!(result_text(Some(json!({"apy": 9.5}))), r#"{"apy":9.5}"#);
    }

    #[test]
    fn test_start_job_body_shape() {
        let fields = vec![InputField::new("text", "hi"), InputField::new("agent_type", "x")];
        let json = serde_json::to_value(StartJobBody { input_data: &fields }).unwrap();
        assert_eq!(json["input_data"][0]["key"], "text");
        assert_eq!(json["input_data"][0]["value"], "hi");
        assert_eq!(json["input_data"][1]["key"], "agent_type");
    }

    #[test]
    fn test_timeouts_from_config() {
        let timeouts = ProtocolTimeouts::from(&OrchestratorConfig::default());
        assert_eq!(timeouts.availability, Duration::from_secs(3));
        assert_eq!(timeouts.submit, Duration::from_secs(10));
    }

    #[test]
    fn test_adapter_set_falls_back_to_default() {
        let http: Arc<dyn AgentProtocolAdapter> =
            Arc::new(HttpJobAdapter::new(ProtocolTimeouts::from(&OrchestratorConfig::default())));
        let shade: Arc<dyn AgentProtocolAdapter> =
            Arc::new(HttpJobAdapter::new(ProtocolTimeouts::from(&OrchestratorConfig::default())));
        let set = AdapterSet::new(http.clone()).with_network(AgentNetwork::Shade, shade.clone());
        assert!(Arc::ptr_eq(&set.for_network(AgentNetwork::Masumi), &http));
        assert!(Arc::ptr_eq(&set.for_network(AgentNetwork::Shade), &shade));
    }
}
