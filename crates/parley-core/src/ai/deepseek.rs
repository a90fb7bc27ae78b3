use super::transport::{to_body, HttpTransport, Transport};
use crate::error::ApiError;
use crate::model::Model;
use crate::state::Message;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

/// Decoded chat completion body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    /// Only sent by `deepseek-reasoner`
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// `choices[0].message.content`
    pub fn reply(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }
}

#[derive(Clone)]
pub struct DeepSeekClient {
    transport: Arc<dyn Transport>,
    api_key: Option<String>,
    model: String,
    api_url: String,
}

impl DeepSeekClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_transport(api_key, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(api_key: Option<String>, transport: Arc<dyn Transport>) -> Self {
        let client = Self {
            transport,
            api_key: None,
            model: Model::default().as_str().to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        };
        client.with_api_key(api_key)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.set_api_key(api_key);
        if self.api_key.is_none() {
            warn!("no DeepSeek API key configured; requests will be refused until one is set");
        }
        self
    }

    /// Blank keys count as missing
    pub fn set_api_key(&mut self, api_key: Option<String>) {
        self.api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Send the full history and return the decoded response body
    pub async fn complete(&self, messages: &[Message]) -> Result<ChatResponse, ApiError> {
        let api_key = self.api_key.as_deref().ok_or(ApiError::MissingApiKey)?;

        let body = to_body(&ChatRequest {
            model: &self.model,
            messages,
        })?;
        debug!(model = %self.model, messages = messages.len(), "sending chat completion");

        let response = self
            .transport
            .post_json(&self.api_url, api_key, &body)
            .await?;

        if !response.is_success() {
            return Err(ApiError::Status {
                status: response.status,
                body: response.body,
            });
        }

        let decoded: ChatResponse = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        if let Some(usage) = &decoded.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat completion finished"
            );
        }

        Ok(decoded)
    }

    /// Like `complete`, but gives up with `ApiError::Cancelled` once `cancel` fires
    pub async fn complete_cancellable(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ApiError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = self.complete(messages) => result,
        }
    }

    /// Assistant text of the first choice
    pub async fn reply(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let response = self.complete_cancellable(messages, cancel).await?;
        response
            .reply()
            .map(str::to_owned)
            .ok_or(ApiError::EmptyResponse)
    }
}
