//! Gateways to the two external capabilities: speech-to-text and text
//! generation.
//!
//! The gateways own input validation, retry and output validation. The
//! actual services sit behind the [`SpeechToText`] and [`TextGenerator`]
//! traits so they can be swapped for scripted stand-ins.

mod generation;
mod retry;
mod scripted;
mod transcription;

pub use generation::*;
pub use retry::*;
pub use scripted::*;
pub use transcription::*;

use thiserror::Error;

use crate::models::TemplateKind;

/// Failure reported by a backend, classified for retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Worth retrying: rate limits, server errors, timeouts
    #[error("transient: {0}")]
    Transient(String),

    /// Retrying cannot help: bad credentials, rejected request
    #[error("permanent: {0}")]
    Permanent(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

/// Gateway errors.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("{what} too large: {actual} exceeds limit of {limit}")]
    InputTooLarge {
        what: &'static str,
        actual: u64,
        limit: u64,
    },

    #[error("Unsupported audio format: {0}")]
    UnsupportedAudioFormat(String),

    #[error("Failed to read audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Generated {kind} note is missing sections: {}", missing.join(", "))]
    MalformedOutput {
        kind: TemplateKind,
        missing: Vec<String>,
    },

    #[error("Transcription unavailable after {attempts} attempt(s): {last_error}")]
    TranscriptionUnavailable { attempts: u32, last_error: String },

    #[error("Note generation unavailable after {attempts} attempt(s): {last_error}")]
    GenerationUnavailable { attempts: u32, last_error: String },
}

pub type GatewayResult<T> = Result<T, GatewayError>;
