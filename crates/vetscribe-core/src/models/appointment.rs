//! Appointment models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::dental::{DentalAnalysis, DentalChart};
use super::patient::PatientKey;
use super::pims::PimsReceipt;

/// Appointment lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Work in progress, may be saved repeatedly
    Draft,
    /// Committed clinical record; transcript is locked
    Finalized,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Draft => "draft",
            AppointmentStatus::Finalized => "finalized",
        }
    }
}

/// Where the transcript came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// Recorded in the exam room
    Recorded,
    /// Uploaded audio file
    Uploaded,
    /// Typed or pasted by the user
    Manual,
}

impl TranscriptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptSource::Recorded => "recorded",
            TranscriptSource::Uploaded => "uploaded",
            TranscriptSource::Manual => "manual",
        }
    }
}

/// Appointment mutation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AppointmentError {
    #[error("Transcript of finalized appointment {0} cannot be changed")]
    TranscriptLocked(String),
}

/// A single veterinary visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    /// Unique appointment ID
    pub appointment_id: String,
    /// Identity key of the patient
    pub patient_key: PatientKey,
    /// Visit timestamp
    pub recorded_at: String,
    pub reason: Option<String>,
    pub veterinarian: Option<String>,
    /// Raw transcript text
    pub transcript: String,
    pub transcript_source: Option<TranscriptSource>,
    pub soap_note: Option<String>,
    pub client_summary: Option<String>,
    pub client_email: Option<String>,
    pub dental_chart: Option<DentalChart>,
    pub dental_analysis: Option<DentalAnalysis>,
    pub status: AppointmentStatus,
    pub pims_receipt: Option<PimsReceipt>,
    pub created_at: String,
    pub updated_at: String,
}

impl Appointment {
    /// Create a new draft appointment for a patient.
    pub fn new(patient_key: PatientKey) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            appointment_id: uuid::Uuid::new_v4().to_string(),
            patient_key,
            recorded_at: now.clone(),
            reason: None,
            veterinarian: None,
            transcript: String::new(),
            transcript_source: None,
            soap_note: None,
            client_summary: None,
            client_email: None,
            dental_chart: None,
            dental_analysis: None,
            status: AppointmentStatus::Draft,
            pims_receipt: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.status == AppointmentStatus::Finalized
    }

    pub fn has_transcript(&self) -> bool {
        !self.transcript.trim().is_empty()
    }

    /// Replace the transcript.
    ///
    /// Fails once the appointment is finalized.
    pub fn set_transcript(
        &mut self,
        transcript: String,
        source: TranscriptSource,
    ) -> Result<(), AppointmentError> {
        if self.is_finalized() {
            return Err(AppointmentError::TranscriptLocked(
                self.appointment_id.clone(),
            ));
        }
        self.transcript = transcript;
        self.transcript_source = Some(source);
        self.touch();
        Ok(())
    }

    /// Mark the appointment as finalized.
    pub fn finalize(&mut self) {
        self.status = AppointmentStatus::Finalized;
        self.touch();
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}
