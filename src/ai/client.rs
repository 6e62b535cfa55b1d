//! OpenAI-compatible chat completion client, used for both OpenAI and
//! OpenRouter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{config::UpstreamConfig, error::ApiError};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("provider rejected credentials ({0})")]
    Unauthorized(u16),
    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected response: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Request(e.to_string())
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::NotConfigured(what) => {
                warn!(%what, "upstream not configured");
                ApiError::ServiceUnavailable("The AI service is not configured".into())
            }
            UpstreamError::Timeout => ApiError::GatewayTimeout,
            UpstreamError::RateLimited { .. } => ApiError::ServiceUnavailable(
                "The AI provider is rate limiting requests, please try again later".into(),
            ),
            UpstreamError::Unauthorized(status) => {
                warn!(status, "upstream rejected our credentials");
                ApiError::BadGateway("The AI service rejected the request".into())
            }
            other => {
                warn!(error = %other, "upstream failure");
                ApiError::BadGateway("The AI service returned an error".into())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_with_image(text: impl Into<String>, image_url: String) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: image_url },
                },
            ]),
        }
    }
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Returns the first choice's text.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, UpstreamError>;

    fn provider_name(&self) -> &'static str;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
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
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct OpenAiCompatClient {
    name: &'static str,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        name: &'static str,
        cfg: &UpstreamConfig,
        max_tokens: u32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name,
            api_key: cfg.api_key.clone(),
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            model: cfg.model.clone(),
            max_tokens,
            client,
        })
    }
}

#[async_trait]
impl ChatCompletion for OpenAiCompatClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::NotConfigured(self.name))?;

        let request = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(UpstreamError::RateLimited { retry_after_secs });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpstreamError::Unauthorized(status.as_u16()));
        }

        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        parse_completion(&body).inspect(|text| {
            debug!(provider = self.name, chars = text.len(), "completion received");
        })
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

fn parse_completion(body: &str) -> Result<String, UpstreamError> {
    let parsed: CompletionResponse =
        serde_json::from_str(body).map_err(|e| UpstreamError::BadResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| UpstreamError::BadResponse("no completion text".into()))
}
