//! Crate-wide error taxonomy.
//!
//! Module errors ([`GatewayError`], [`DentalError`], [`DbError`],
//! [`ExportError`]) stay precise inside their modules; the public facade
//! reports everything as a [`ScribeError`].

use thiserror::Error;

use crate::config::ConfigError;
use crate::db::DbError;
use crate::dental::DentalError;
use crate::export::ExportError;
use crate::gateway::GatewayError;
use crate::models::{AppointmentError, TemplateKind};
use crate::vocab::NumberingScheme;

#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("{what} too large: {actual} exceeds limit of {limit}")]
    InputTooLarge {
        what: &'static str,
        actual: u64,
        limit: u64,
    },

    #[error("Empty input: {0}")]
    EmptyInput(String),

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

    #[error("Tooth {tooth} does not exist in the {scheme} numbering scheme")]
    InvalidToothReference { tooth: u16, scheme: NumberingScheme },

    #[error("Patient {0} is already registered under a different record")]
    DuplicatePatientConflict(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Transcript of finalized appointment {0} cannot be changed")]
    TranscriptLocked(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, ScribeError>;

impl From<GatewayError> for ScribeError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::EmptyInput(msg) => ScribeError::EmptyInput(msg),
            GatewayError::InputTooLarge { what, actual, limit } => {
                ScribeError::InputTooLarge { what, actual, limit }
            }
            GatewayError::UnsupportedAudioFormat(msg) => {
                ScribeError::InvalidInput(format!("unsupported audio format: {}", msg))
            }
            GatewayError::Io(e) => ScribeError::InvalidInput(format!("cannot read audio: {}", e)),
            GatewayError::UnknownTemplate(name) => ScribeError::UnknownTemplate(name),
            GatewayError::MalformedOutput { kind, missing } => {
                ScribeError::MalformedOutput { kind, missing }
            }
            GatewayError::TranscriptionUnavailable { attempts, last_error } => {
                ScribeError::TranscriptionUnavailable { attempts, last_error }
            }
            GatewayError::GenerationUnavailable { attempts, last_error } => {
                ScribeError::GenerationUnavailable { attempts, last_error }
            }
        }
    }
}

impl From<DentalError> for ScribeError {
    fn from(e: DentalError) -> Self {
        match e {
            DentalError::InvalidToothReference { tooth, scheme } => {
                ScribeError::InvalidToothReference { tooth, scheme }
            }
        }
    }
}

impl From<DbError> for ScribeError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => ScribeError::NotFound(what),
            DbError::DuplicatePatientConflict(key) => ScribeError::DuplicatePatientConflict(key),
            DbError::TranscriptLocked(id) => ScribeError::TranscriptLocked(id),
            DbError::InvalidInput(msg) => ScribeError::InvalidInput(msg),
            other => ScribeError::StorageFailure(other.to_string()),
        }
    }
}

impl From<ExportError> for ScribeError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::Json(e) => ScribeError::StorageFailure(format!("bundle JSON: {}", e)),
            other => ScribeError::InvalidInput(other.to_string()),
        }
    }
}

impl From<AppointmentError> for ScribeError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::TranscriptLocked(id) => ScribeError::TranscriptLocked(id),
        }
    }
}

impl From<ConfigError> for ScribeError {
    fn from(e: ConfigError) -> Self {
        ScribeError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ScribeError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ScribeError::StorageFailure(format!("Lock poisoned: {}", e))
    }
}
