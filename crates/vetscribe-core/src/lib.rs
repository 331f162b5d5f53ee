//! VetScribe Core Library
//!
//! Turns a spoken veterinary visit into a structured clinical record: SOAP
//! note, client summary, optional client email and a dental chart with
//! recommendations, stored against the patient's appointment history.
//!
//! # Architecture
//!
//! ```text
//! Audio ──▶ Transcription Gateway ──▶ transcript ◀── manual entry
//!                                          │
//!                                          ▼
//!                              Note Generation Gateway
//!                              (SOAP, client summary, email)
//!                                          │
//!                        transcript + SOAP │
//!                                          ▼
//!                                Dental Finding Engine
//!                          extract → chart → analyze
//!                                          │
//!                                          ▼
//!                 ┌──────────── Record Store (SQLite) ────────────┐
//!                 │   finalize = ensure patient + save appointment │
//!                 │              in one transaction                │
//!                 └───────────────┬────────────────┬───────────────┘
//!                                 ▼                ▼
//!                          Export (text,      PIMS Adapter
//!                          bundle, CSV)       (simulated)
//! ```
//!
//! # Modules
//!
//! - [`vocab`]: Tooth numbering schemes, conditions and keyword triggers
//! - [`models`]: Domain types (Patient, Appointment, DentalChart, templates)
//! - [`dental`]: Finding extraction, charting and rule-based analysis
//! - [`gateway`]: Speech-to-text and note generation with retry and validation
//! - [`db`]: SQLite database layer
//! - [`store`]: Thread-safe record store over the database
//! - [`export`]: Plain-text records and full-store bundles
//! - [`pims`]: Practice-management push interface and its simulated stand-in
//! - [`pipeline`]: Session-based composition of all stages
//! - [`config`]: TOML configuration

pub mod config;
pub mod db;
pub mod dental;
pub mod error;
pub mod export;
pub mod gateway;
pub mod models;
pub mod pims;
pub mod pipeline;
pub mod store;
pub mod vocab;

// Re-export commonly used types
pub use config::ScribeConfig;
pub use db::Database;
pub use error::{Result, ScribeError};
pub use export::ExportBundle;
pub use gateway::{
    AudioEncoding, AudioPayload, AudioSource, BackendError, GenerationRequest,
    NoteGenerationGateway, SpeechToText, TextGenerator, TranscriptionGateway,
};
pub use models::{
    Appointment, AppointmentStatus, DentalAnalysis, DentalChart, Finding, GeneratedNote,
    NoteContext, Patient, PatientDetails, PatientKey, PimsReceipt, PimsSystem, Species,
    TemplateKind, TranscriptSource,
};
pub use pims::{PimsAdapter, SimulatedPims};
pub use pipeline::{
    DocumentationPipeline, FinalizeFailure, FinalizedRecord, PipelineError, SessionContext,
    SessionOutput, Stage, VisitDetails,
};
pub use store::RecordStore;
pub use vocab::{DentalCondition, NumberingScheme, Severity, VOCABULARY_VERSION};
