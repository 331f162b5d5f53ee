//! Parsing of OpenAI-compatible responses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Response parsing errors.
#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

pub type ResponseResult<T> = Result<T, ResponseError>;

/// `/v1/audio/transcriptions` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

/// `/v1/chat/completions` response body (fields we read).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    pub content: Option<String>,
}

/// `{"error": {...}}` body returned with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiError {
    message: String,
}

/// Transcript text from a transcription response.
pub fn parse_transcription(json: &str) -> ResponseResult<String> {
    let response: TranscriptionResponse = serde_json::from_str(json)?;
    Ok(response.text.trim().to_string())
}

/// Text of the first choice of a chat completion.
pub fn parse_chat_completion(json: &str) -> ResponseResult<String> {
    let response: ChatCompletionResponse = serde_json::from_str(json)?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ResponseError::InvalidFormat("response has no choices".into()))?;
    let content = choice
        .message
        .content
        .ok_or_else(|| ResponseError::InvalidFormat("choice has no content".into()))?;
    Ok(strip_code_fence(&content))
}

/// Human-readable message from an error body, falling back to the raw text.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Remove a surrounding markdown code fence, if the model added one.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string ("markdown", "text", ...) on the opening line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}
