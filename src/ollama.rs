//! Inference boundary: the local Ollama chat API.
//!
//! A single blocking-style request per turn with a fixed timeout and no
//! retry. Failures come back as a tagged [`ChatError`] that the session
//! matches into fixed user-visible fallback phrases.

use crate::config::ModelSettings;
use crate::message::Message;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Tagged failure reasons for one inference attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChatError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("unexpected status {0}")]
    BadStatus(u16),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// The seam between the session and the inference service. The session is
/// generic over this so tests can substitute a scripted backend.
pub trait ChatBackend {
    /// Single-attempt completion over the recent message window.
    fn chat(
        &self,
        messages: &[Message],
    ) -> impl Future<Output = std::result::Result<String, ChatError>> + Send;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: GenerationOptions,
}

/// Generation parameters in Ollama's `options` shape.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerationOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: GenerationOptions,
}

impl OllamaClient {
    pub fn new(settings: &ModelSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            model: settings.name.clone(),
            options: GenerationOptions {
                num_predict: settings.max_tokens,
                temperature: settings.temperature,
                top_p: settings.top_p,
                repeat_penalty: settings.repeat_penalty,
            },
        })
    }
}

impl ChatBackend for OllamaClient {
    async fn chat(&self, messages: &[Message]) -> std::result::Result<String, ChatError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: self.options,
        };

        debug!(model = %self.model, window = messages.len(), "sending chat request");
        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::BadStatus(status.as_u16()));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Unexpected(e.to_string()))?;
        Ok(payload.message.content)
    }
}

fn classify_send_error(err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        ChatError::Timeout
    } else if err.is_connect() {
        ChatError::Connection(err.to_string())
    } else {
        ChatError::Unexpected(err.to_string())
    }
}
