use std::time::Duration;

use async_trait::async_trait;
use bitte_common::{BitteError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{ChatBackend, ChatMessage, ChatReply};

pub const DEFAULT_BACKEND_URL: &str = "https://solanaaihackathon.onrender.com/api/v1/chat";

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatMessage],
    model: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any endpoint speaking the `{messages, model}` → `choices`
/// completion shape. The URL is used as-is; no path is appended.
pub struct OpenAiCompatibleBackend {
    url: String,
    api_key: Option<String>,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(url: Option<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            url: url.unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            api_key,
            timeout,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatibleBackend {
    async fn chat(&self, messages: Vec<ChatMessage>, model: &str) -> Result<ChatReply> {
        let body = CompletionRequest {
            messages: &messages,
            model,
        };

        let mut http_req = self
            .http_client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body);
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        debug!(url = %self.url, model, messages = messages.len(), "Calling chat backend");

        let response = http_req.send().await.map_err(|e| {
            if e.is_timeout() {
                BitteError::NetworkTimeout(format!("chat backend: {e}"))
            } else {
                BitteError::Backend(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(BitteError::Backend(format!(
                "chat backend error {status}: {body_text}"
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| BitteError::MalformedResponse(format!("chat backend: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty());

        Ok(ChatReply {
            content,
            model: completion.model.unwrap_or_else(|| model.to_string()),
        })
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}
