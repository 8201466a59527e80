use crate::config::BackendConfig;
use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// One classification call: system + user instructions, sampling temperature,
/// and whether a JSON object response is requested.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub json_output: bool,
}

/// The external reasoning service. Returns the raw response text, which the
/// caller decodes. Blocking; callers that must not block dispatch it on a
/// worker thread.
pub trait ClassificationBackend: Send {
    fn complete(&self, request: &BackendRequest) -> Result<String, BackendError>;
}

impl<B: ClassificationBackend + Sync + ?Sized> ClassificationBackend for std::sync::Arc<B> {
    fn complete(&self, request: &BackendRequest) -> Result<String, BackendError> {
        (**self).complete(request)
    }
}

impl<B: ClassificationBackend + ?Sized> ClassificationBackend for Box<B> {
    fn complete(&self, request: &BackendRequest) -> Result<String, BackendError> {
        (**self).complete(request)
    }
}

/// OpenAI-compatible `/v1/chat/completions` client.
pub struct HttpBackend {
    config: BackendConfig,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Http(format!("failed to create HTTP client: {e}")))?;
        let api_key = config.resolved_api_key();
        Ok(Self { config, api_key, client })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }
}

impl ClassificationBackend for HttpBackend {
    fn complete(&self, request: &BackendRequest) -> Result<String, BackendError> {
        let api_key = self.api_key.as_deref().ok_or(BackendError::Disabled)?;

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system".to_string(), content: request.system_prompt.clone() },
                ChatMessage { role: "user".to_string(), content: request.user_prompt.clone() },
            ],
            temperature: request.temperature,
            response_format: request
                .json_output
                .then(|| serde_json::json!({"type": "json_object"})),
        };

        debug!(model = %self.config.model, url = %self.url(), "sending classification request");
        let response = self
            .client
            .post(self.url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(self.config.timeout_secs)
                } else {
                    BackendError::Http(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Status { status: status.as_u16(), body });
        }

        let body = response
            .text()
            .map_err(|e| BackendError::Http(format!("failed to read response body: {e}")))?;
        completion_content(&body)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions envelope.
/// Missing or blank content is `EmptyResponse`.
pub fn completion_content(body: &str) -> Result<String, BackendError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::Http(format!("failed to parse response envelope: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(BackendError::EmptyResponse)
}
