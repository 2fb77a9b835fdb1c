// src/services/llm_client.rs
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider quota exceeded")]
    QuotaExceeded,
    #[error("provider rate limit exceeded")]
    RateLimited,
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("request to provider failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: i32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
}

/// Client for OpenAI-compatible `chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Sends one completion request. Failures are classified but never retried.
    pub async fn complete(
        &self,
        params: &CompletionParams,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: &params.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        tracing::debug!(model = %params.model, messages = messages.len(), "sending completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no completion choices returned".to_string()))
    }
}

fn classify_error(status: StatusCode, body: &str) -> LlmError {
    let provider = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);

    let is_quota = provider
        .as_ref()
        .map(|e| e.code.as_deref() == Some("insufficient_quota") || e.kind.as_deref() == Some("insufficient_quota"))
        .unwrap_or(false);

    if is_quota {
        return LlmError::QuotaExceeded;
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return LlmError::RateLimited;
    }

    let message = provider
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.chars().take(200).collect());
    LlmError::Api {
        status: status.as_u16(),
        message,
    }
}
