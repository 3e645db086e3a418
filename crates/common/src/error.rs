//! Error types for the Bitte relay.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BitteError {
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Agent {agent} is not available ({detail})")]
    AgentUnavailable { agent: String, detail: String },

    #[error("Input schema fetch failed: {0}")]
    SchemaFetchFailed(String),

    #[error("Job start failed: {0}")]
    SubmissionFailed(String),

    #[error("Job {last_status}. Last result: {partial}")]
    PollingTimedOut {
        attempts: u32,
        last_status: String,
        partial: String,
    },

    #[error("Job {status}. Last result: {partial}")]
    PollingFailedStatus { status: String, partial: String },

    #[error("Request timed out: {0}")]
    NetworkTimeout(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Chat backend error: {0}")]
    Backend(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BitteError {
    /// Timeout-class failures: the agent did not answer in time or answered
    /// with something that could not be parsed. Callers may retry these.
    pub fn is_timeout_class(&self) -> bool {
        matches!(self, Self::NetworkTimeout(_) | Self::MalformedResponse(_))
    }

    /// Errors that surface to the inbound caller as a server fault.
    pub fn is_internal_fault(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::Internal(_)
                | Self::Config(_)
                | Self::Io(_)
                | Self::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BitteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_class() {
        assert!(BitteError::NetworkTimeout("status".into()).is_timeout_class());
        assert!(BitteError::MalformedResponse("not json".into()).is_timeout_class());
        assert!(!BitteError::Network("connection refused".into()).is_timeout_class());
        assert!(!BitteError::SubmissionFailed("HTTP 500".into()).is_timeout_class());
    }

    #[test]
    fn test_internal_fault_classification() {
        assert!(BitteError::InvalidRequest("no messages".into()).is_internal_fault());
        assert!(!BitteError::NetworkTimeout("availability".into()).is_internal_fault());
        assert!(!BitteError::Cancelled.is_internal_fault());
    }

    #[test]
    fn test_polling_messages() {
        let err = BitteError::PollingTimedOut {
            attempts: 30,
            last_status: "pending".into(),
            partial: String::new(),
        };
        assert_eq!(err.to_string(), "Job pending. Last result: ");

        let err = BitteError::PollingFailedStatus {
            status: "failed".into(),
            partial: "out of gas".into(),
        };
        assert_eq!(err.to_string(), "Job failed. Last result: out of gas");
    }
}
