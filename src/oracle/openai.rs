//! OpenAI-compatible chat-completions backend.

use super::{Oracle, OracleError, OracleRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct OpenAiOracle {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiOracle {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Rejected(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    /// Set a custom base URL (Azure, proxies, local gateways).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Reasoning models only accept `max_completion_tokens`.
fn uses_max_completion_tokens(model: &str) -> bool {
    model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
        || model.starts_with("gpt-5")
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn analyze(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let start = Instant::now();
        let completion_style = uses_max_completion_tokens(&request.model);
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: (!completion_style).then_some(request.max_tokens),
            max_completion_tokens: completion_style.then_some(request.max_tokens),
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "chat completion request failed");
                OracleError::Transient(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "chat completion API error");
            return Err(classify_status(status, &error_text));
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OracleError::InvalidResponse("no completion content".into()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "chat completion"
        );
        Ok(content)
    }
}

/// Map a non-2xx status onto the oracle failure kinds.
pub fn classify_status(status: StatusCode, body: &str) -> OracleError {
    let msg = format!("HTTP {}: {}", status.as_u16(), truncate(body, 300));
    if status == StatusCode::TOO_MANY_REQUESTS {
        if body.contains("insufficient_quota") {
            OracleError::QuotaExceeded(msg)
        } else {
            OracleError::Transient(msg)
        }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        OracleError::Transient(msg)
    } else {
        OracleError::Rejected(msg)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
