//! Job tracking types for remote agent invocations.

use serde::{Deserialize, Serialize};

use crate::AgentNetwork;

/// Status reported by a remote agent for a job.
///
/// The vocabulary belongs to the agent. Anything other than `completed` or
/// `failed` means the job is still in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One in-flight remote invocation. Lives for a single orchestrator run.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: String,
    pub payment_id: Option<String>,
    pub status: JobStatus,
    pub result_text: String,
    attempts: u32,
    max_attempts: u32,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>, payment_id: Option<String>, max_attempts: u32) -> Self {
        Self {
            job_id: job_id.into(),
            payment_id,
            status: JobStatus::Pending,
            result_text: String::new(),
            attempts: 0,
            max_attempts,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether another poll is allowed.
    pub fn can_poll(&self) -> bool {
        !self.status.is_terminal() && self.attempts < self.max_attempts
    }

    /// Record the outcome of one poll. Calls past the ceiling are ignored.
    /// The latest poll's result always replaces the previous one.
    pub fn record_poll(&mut self, status: JobStatus, result_text: String) {
        if self.attempts >= self.max_attempts {
            return;
        }
        self.attempts += 1;
        self.status = status;
        self.result_text = result_text;
    }

    /// The ceiling was reached without a terminal status.
    pub fn is_exhausted(&self) -> bool {
        !self.status.is_terminal() && self.attempts >= self.max_attempts
    }
}

/// Why an agent invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unavailable,
    SchemaFetch,
    Submission,
    PollingTimedOut,
    PollingFailed,
    /// Timeout-class: no answer in time or an unparsable answer
    Unreachable,
    Network,
    Cancelled,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable)
    }
}

/// Normalized outcome of one orchestrator run.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Success {
        text: String,
        agent_name: String,
        job_id: String,
        payment_id: Option<String>,
        network: AgentNetwork,
    },
    Failure {
        reason: String,
        agent_name: String,
        kind: FailureKind,
    },
}

impl JobResult {
    pub fn failure(agent_name: impl Into<String>, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
            agent_name: agent_name.into(),
            kind,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn agent_name(&self) -> &str {
        match self {
            Self::Success { agent_name, .. } | Self::Failure { agent_name, .. } => agent_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(JobStatus::from("completed"), JobStatus::Completed);
        assert_eq!(JobStatus::from("FAILED"), JobStatus::Failed);
        assert_eq!(JobStatus::from("running"), JobStatus::Running);
        assert_eq!(
            JobStatus::from("awaiting_payment"),
            JobStatus::Other("awaiting_payment".into())
        );
        assert!(!JobStatus::from("awaiting_payment").is_terminal());
        assert!(JobStatus::Completed.is_terminal());
    }

    #[test]
    fn test_status_deserializes_from_string() {
        let status: JobStatus = serde_json::from_str(r#""completed""#).unwrap();
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(serde_json::to_string(&JobStatus::Other("queued".into())).unwrap(), r#""queued""#);
    }

    #[test]
    fn test_handle_attempt_ceiling() {
        let mut handle = JobHandle::new("job-1", None, 3);
        for _ in 0..5 {
            handle.record_poll(JobStatus::Pending, String::new());
        }
        assert_eq!(handle.attempts(), 3);
        assert!(handle.is_exhausted());
        assert!(!handle.can_poll());
    }

    #[test]
    fn test_handle_stops_on_terminal() {
        let mut handle = JobHandle::new("job-1", Some("pay-1".into()), 30);
        assert!(handle.can_poll());
        handle.record_poll(JobStatus::Completed, "done".into());
        assert_eq!(handle.attempts(), 1);
        assert!(!handle.can_poll());
        assert!(!handle.is_exhausted());
        assert_eq!(handle.result_text, "done");
    }

    #[test]
    fn test_handle_completed_empty_result_replaces_progress() {
        let mut handle = JobHandle::new("job-1", None, 30);
        handle.record_poll(JobStatus::Running, "Thinking... 50%".into());
        handle.record_poll(JobStatus::Completed, String::new());
        assert_eq!(handle.result_text, "");
        assert_eq!(handle.attempts(), 2);
        assert!(!handle.can_poll());
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(FailureKind::Unreachable.is_retryable());
        assert!(!FailureKind::Unavailable.is_retryable());
        assert!(!FailureKind::PollingTimedOut.is_retryable());
    }
}
