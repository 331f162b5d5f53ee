//! OpenAI-compatible HTTP backends.
//!
//! [`WhisperTranscriber`] posts multipart audio to
//! `/v1/audio/transcriptions`; [`ChatGenerator`] posts a system + user
//! message pair to `/v1/chat/completions`. Both classify failures for the
//! gateways' retry loop:
//!
//! - 408, 429, 5xx, connect errors and timeouts are transient
//! - every other 4xx, and unreadable success bodies, are permanent

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, StatusCode};
use serde::Serialize;
use tracing::debug;
use vetscribe_core::{AudioPayload, BackendError, GenerationRequest, SpeechToText, TextGenerator};

use crate::prompts::{build_messages, ChatMessage, TRANSCRIPTION_PROMPT};
use crate::response::{error_message, parse_chat_completion, parse_transcription};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Connection settings. Credentials are supplied by the caller.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Scheme and host, without the `/v1` path
    pub base_url: String,
    pub transcription_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Client-side HTTP timeout
    pub request_timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            transcription_model: "whisper-1".to_string(),
            chat_model: "gpt-4".to_string(),
            temperature: 0.3,
            max_tokens: 1500,
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn build_client(config: &OpenAiConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Classify a non-success HTTP status.
pub fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let message = format!("HTTP {}: {}", status.as_u16(), error_message(body));
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        BackendError::Transient(message)
    } else {
        BackendError::Permanent(message)
    }
}

/// Classify a transport failure carried in an `anyhow` chain.
fn classify_transport(err: anyhow::Error) -> BackendError {
    let transient = err
        .downcast_ref::<reqwest::Error>()
        .map_or(false, |e| e.is_timeout() || e.is_connect() || e.is_request());
    let message = format!("{:#}", err);
    if transient {
        BackendError::Transient(message)
    } else {
        BackendError::Permanent(message)
    }
}

/// Send a request and return the body of a successful response.
async fn send(request: reqwest::RequestBuilder, what: &str) -> Result<String, BackendError> {
    let response = request
        .send()
        .await
        .with_context(|| format!("{} request failed", what))
        .map_err(classify_transport)?;

    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read {} response", what))
        .map_err(classify_transport)?;

    if !status.is_success() {
        return Err(classify_status(status, &body));
    }
    Ok(body)
}

/// Whisper speech-to-text backend.
pub struct WhisperTranscriber {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl SpeechToText for WhisperTranscriber {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, BackendError> {
        let part = multipart::Part::bytes(audio.data.clone())
            .file_name(audio.file_name.clone())
            .mime_str(audio.encoding.mime_type())
            .map_err(|e| BackendError::Permanent(format!("invalid MIME type: {}", e)))?;

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("model", self.config.transcription_model.clone())
            .text("prompt", TRANSCRIPTION_PROMPT);

        if let Some(ref language) = audio.language {
            form = form.text("language", language.clone());
        }

        debug!(bytes = audio.data.len(), model = %self.config.transcription_model, "Posting audio");
        let request = self
            .client
            .post(self.config.endpoint("/v1/audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form);

        let body = send(request, "Whisper API").await?;
        parse_transcription(&body)
            .map_err(|e| BackendError::Permanent(format!("unreadable transcription response: {}", e)))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Chat-completion text generation backend.
pub struct ChatGenerator {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl ChatGenerator {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl TextGenerator for ChatGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let body = ChatRequest {
            model: &self.config.chat_model,
            messages: build_messages(request),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(kind = %request.kind, model = %self.config.chat_model, "Requesting completion");
        let http = self
            .client
            .post(self.config.endpoint("/v1/chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body);

        let response = send(http, "Chat completion").await?;
        parse_chat_completion(&response)
            .map_err(|e| BackendError::Permanent(format!("unreadable completion response: {}", e)))
    }
}
