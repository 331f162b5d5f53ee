//! Documentation pipeline.
//!
//! One [`SessionContext`] per appointment being documented. Each stage
//! writes its output into the session as soon as it succeeds, so a failure
//! in a later stage never loses earlier work:
//!
//! ```text
//! start_session → transcribe | supply_transcript → generate_notes
//!     → [generate_client_email] → analyze_dental → [save_draft] → finalize
//!     → [push_to_pims]
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::ScribeConfig;
use crate::dental::{analyze, chart, extract, merge_findings, scheme_for};
use crate::error::ScribeError;
use crate::gateway::{
    AudioSource, NoteGenerationGateway, SpeechToText, TextGenerator, TranscriptionGateway,
};
use crate::models::{
    Appointment, DentalAnalysis, GeneratedNote, NoteContext, Patient, PatientDetails, PimsReceipt,
    TemplateKind, TranscriptSource,
};
use crate::pims::{PimsAdapter, SimulatedPims};
use crate::store::RecordStore;

/// Pipeline stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    Generation,
    Charting,
    Storage,
    Pims,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Transcription => "transcription",
            Stage::Generation => "generation",
            Stage::Charting => "charting",
            Stage::Storage => "storage",
            Stage::Pims => "pims",
        })
    }
}

/// Outputs a session can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutput {
    Transcript,
    SoapNote,
    ClientSummary,
    ClientEmail,
    DentalChart,
}

/// A failed stage, with what the session still holds.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub error: ScribeError,
    pub retained: Vec<SessionOutput>,
}

/// A failed finalize. The session is handed back untouched.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct FinalizeFailure {
    #[source]
    pub error: PipelineError,
    pub session: Box<SessionContext>,
}

/// Visit metadata entered when a session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitDetails {
    pub reason: Option<String>,
    pub veterinarian: Option<String>,
    /// RFC 3339; defaults to now
    pub recorded_at: Option<String>,
}

/// In-progress documentation of one appointment.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    patient: PatientDetails,
    appointment: Appointment,
}

impl SessionContext {
    pub fn new(patient: PatientDetails, visit: VisitDetails) -> Self {
        let mut appointment = Appointment::new(patient.key());
        appointment.reason = visit.reason;
        appointment.veterinarian = visit.veterinarian;
        if let Some(recorded_at) = visit.recorded_at {
            appointment.recorded_at = recorded_at;
        }
        Self {
            patient,
            appointment,
        }
    }

    pub fn patient(&self) -> &PatientDetails {
        &self.patient
    }

    pub fn appointment(&self) -> &Appointment {
        &self.appointment
    }

    pub fn appointment_id(&self) -> &str {
        &self.appointment.appointment_id
    }

    pub fn transcript(&self) -> Option<&str> {
        self.appointment
            .has_transcript()
            .then_some(self.appointment.transcript.as_str())
    }

    /// Use a typed or pasted transcript, e.g. when transcription is down.
    pub fn supply_transcript(
        &mut self,
        text: &str,
        source: TranscriptSource,
    ) -> Result<(), ScribeError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ScribeError::EmptyInput("transcript is empty".into()));
        }
        self.appointment.set_transcript(text.to_string(), source)?;
        Ok(())
    }

    /// Template context from the entered details.
    pub fn note_context(&self) -> NoteContext {
        NoteContext::from_details(&self.patient, &self.appointment)
    }

    /// Outputs currently held, in pipeline order.
    pub fn retained(&self) -> Vec<SessionOutput> {
        let a = &self.appointment;
        let mut held = Vec::new();
        if a.has_transcript() {
            held.push(SessionOutput::Transcript);
        }
        if a.soap_note.is_some() {
            held.push(SessionOutput::SoapNote);
        }
        if a.client_summary.is_some() {
            held.push(SessionOutput::ClientSummary);
        }
        if a.client_email.is_some() {
            held.push(SessionOutput::ClientEmail);
        }
        if a.dental_chart.is_some() {
            held.push(SessionOutput::DentalChart);
        }
        held
    }

    fn fail(&self, stage: Stage, error: impl Into<ScribeError>) -> PipelineError {
        PipelineError {
            stage,
            error: error.into(),
            retained: self.retained(),
        }
    }

    fn require_transcript(&self, stage: Stage) -> Result<&str, PipelineError> {
        self.transcript().ok_or_else(|| {
            self.fail(stage, ScribeError::EmptyInput("no transcript in session".into()))
        })
    }
}

/// A committed appointment and its patient.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedRecord {
    pub patient: Patient,
    pub appointment: Appointment,
}

/// Composes both gateways, the dental engine, the record store and the PIMS
/// adapter.
pub struct DocumentationPipeline {
    transcription: TranscriptionGateway,
    generation: NoteGenerationGateway,
    store: RecordStore,
    pims: Arc<dyn PimsAdapter>,
    config: ScribeConfig,
}

impl DocumentationPipeline {
    pub fn new(
        speech_to_text: Arc<dyn SpeechToText>,
        generator: Arc<dyn TextGenerator>,
        store: RecordStore,
        config: ScribeConfig,
    ) -> Self {
        Self {
            transcription: TranscriptionGateway::new(speech_to_text, &config),
            generation: NoteGenerationGateway::new(generator, &config),
            store,
            pims: Arc::new(SimulatedPims::new(config.pims.system)),
            config,
        }
    }

    /// Replace the default simulated PIMS.
    pub fn with_pims_adapter(mut self, pims: Arc<dyn PimsAdapter>) -> Self {
        self.pims = pims;
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn config(&self) -> &ScribeConfig {
        &self.config
    }

    pub fn start_session(&self, patient: PatientDetails, visit: VisitDetails) -> SessionContext {
        let session = SessionContext::new(patient, visit);
        info!(
            appointment = %session.appointment_id(),
            patient = %session.patient.key(),
            "Started session"
        );
        session
    }

    /// Reopen a saved draft.
    pub fn resume_session(&self, appointment_id: &str) -> Result<SessionContext, PipelineError> {
        let storage = |error: ScribeError| PipelineError {
            stage: Stage::Storage,
            error,
            retained: Vec::new(),
        };
        let appointment = self
            .store
            .get_appointment(appointment_id)
            .map_err(storage)?
            .ok_or_else(|| storage(ScribeError::NotFound(format!("appointment {}", appointment_id))))?;
        let patient = self
            .store
            .find_patient(&appointment.patient_key)
            .map_err(storage)?
            .ok_or_else(|| storage(ScribeError::NotFound(format!("patient {}", appointment.patient_key))))?;
        Ok(SessionContext {
            patient: patient.details(),
            appointment,
        })
    }

    /// Transcribe audio into the session.
    #[instrument(skip(self, session, source), fields(appointment = %session.appointment_id()))]
    pub async fn transcribe(
        &self,
        session: &mut SessionContext,
        source: AudioSource,
    ) -> Result<(), PipelineError> {
        self.transcribe_until(session, source, None).await
    }

    /// Like [`transcribe`](Self::transcribe), bounded by `timeout` across
    /// all attempts.
    #[instrument(skip(self, session, source), fields(appointment = %session.appointment_id()))]
    pub async fn transcribe_with_timeout(
        &self,
        session: &mut SessionContext,
        source: AudioSource,
        timeout: Duration,
    ) -> Result<(), PipelineError> {
        self.transcribe_until(session, source, Some(Instant::now() + timeout))
            .await
    }

    async fn transcribe_until(
        &self,
        session: &mut SessionContext,
        source: AudioSource,
        deadline: Option<Instant>,
    ) -> Result<(), PipelineError> {
        let origin = match source {
            AudioSource::Bytes { .. } => TranscriptSource::Recorded,
            AudioSource::File(_) => TranscriptSource::Uploaded,
        };
        let text = match self.transcription.transcribe_until(source, deadline).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Transcription failed; a manual transcript can be supplied");
                return Err(session.fail(Stage::Transcription, e));
            }
        };
        session
            .appointment
            .set_transcript(text, origin)
            .map_err(|e| session.fail(Stage::Transcription, e))?;
        Ok(())
    }

    /// Generate the SOAP note, then the client summary.
    #[instrument(skip(self, session), fields(appointment = %session.appointment_id()))]
    pub async fn generate_notes(
        &self,
        session: &mut SessionContext,
    ) -> Result<(GeneratedNote, GeneratedNote), PipelineError> {
        self.generate_notes_until(session, None).await
    }

    /// Like [`generate_notes`](Self::generate_notes), with one `timeout`
    /// covering both documents.
    #[instrument(skip(self, session), fields(appointment = %session.appointment_id()))]
    pub async fn generate_notes_with_timeout(
        &self,
        session: &mut SessionContext,
        timeout: Duration,
    ) -> Result<(GeneratedNote, GeneratedNote), PipelineError> {
        self.generate_notes_until(session, Some(Instant::now() + timeout))
            .await
    }

    async fn generate_notes_until(
        &self,
        session: &mut SessionContext,
        deadline: Option<Instant>,
    ) -> Result<(GeneratedNote, GeneratedNote), PipelineError> {
        let soap = self.generate(session, TemplateKind::Soap, deadline).await?;
        session.appointment.soap_note = Some(soap.text.clone());
        session.appointment.touch();

        let summary = self
            .generate(session, TemplateKind::ClientSummary, deadline)
            .await?;
        session.appointment.client_summary = Some(summary.text.clone());
        session.appointment.touch();

        Ok((soap, summary))
    }

    #[instrument(skip(self, session), fields(appointment = %session.appointment_id()))]
    pub async fn generate_client_email(
        &self,
        session: &mut SessionContext,
    ) -> Result<GeneratedNote, PipelineError> {
        self.generate_client_email_until(session, None).await
    }

    #[instrument(skip(self, session), fields(appointment = %session.appointment_id()))]
    pub async fn generate_client_email_with_timeout(
        &self,
        session: &mut SessionContext,
        timeout: Duration,
    ) -> Result<GeneratedNote, PipelineError> {
        self.generate_client_email_until(session, Some(Instant::now() + timeout))
            .await
    }

    async fn generate_client_email_until(
        &self,
        session: &mut SessionContext,
        deadline: Option<Instant>,
    ) -> Result<GeneratedNote, PipelineError> {
        let email = self.generate(session, TemplateKind::Email, deadline).await?;
        session.appointment.client_email = Some(email.text.clone());
        session.appointment.touch();
        Ok(email)
    }

    async fn generate(
        &self,
        session: &SessionContext,
        kind: TemplateKind,
        deadline: Option<Instant>,
    ) -> Result<GeneratedNote, PipelineError> {
        let transcript = session.require_transcript(Stage::Generation)?;
        self.generation
            .generate_kind_until(kind, transcript, &session.note_context(), deadline)
            .await
            .map_err(|e| session.fail(Stage::Generation, e))
    }

    /// Chart dental findings from the transcript and SOAP note.
    #[instrument(skip(self, session), fields(appointment = %session.appointment_id()))]
    pub fn analyze_dental(&self, session: &mut SessionContext) -> Result<DentalAnalysis, PipelineError> {
        let transcript = session.require_transcript(Stage::Charting)?;
        let from_transcript = extract(transcript);
        let from_note = session
            .appointment
            .soap_note
            .as_deref()
            .map(extract)
            .unwrap_or_default();
        let findings = merge_findings(&from_transcript, &from_note);

        let scheme = scheme_for(session.patient.species, self.config.dental.default_scheme);
        let dental_chart = chart(&findings, scheme).map_err(|e| session.fail(Stage::Charting, e))?;
        let analysis = analyze(&dental_chart, self.config.dental.referral_threshold);

        info!(
            teeth = dental_chart.teeth.len(),
            referral = analysis.referral_recommended,
            "Dental chart ready"
        );
        session.appointment.dental_chart = Some(dental_chart);
        session.appointment.dental_analysis = Some(analysis.clone());
        session.appointment.touch();
        Ok(analysis)
    }

    /// Persist progress without finalizing.
    #[instrument(skip(self, session), fields(appointment = %session.appointment_id()))]
    pub fn save_draft(&self, session: &SessionContext) -> Result<(), PipelineError> {
        self.store
            .save_draft(&session.patient, &session.appointment)
            .map_err(|e| session.fail(Stage::Storage, e))?;
        info!("Draft saved");
        Ok(())
    }

    /// Commit patient and appointment in one transaction.
    #[instrument(skip(self, session), fields(appointment = %session.appointment_id()))]
    pub fn finalize(&self, session: SessionContext) -> Result<FinalizedRecord, FinalizeFailure> {
        if session.transcript().is_none() {
            let error = session.fail(
                Stage::Storage,
                ScribeError::EmptyInput("no transcript in session".into()),
            );
            return Err(FinalizeFailure {
                error,
                session: Box::new(session),
            });
        }
        match self
            .store
            .finalize_appointment(&session.patient, &session.appointment)
        {
            Ok((patient, appointment)) => Ok(FinalizedRecord {
                patient,
                appointment,
            }),
            Err(e) => {
                warn!(error = %e, "Finalize failed; session returned to caller");
                Err(FinalizeFailure {
                    error: session.fail(Stage::Storage, e),
                    session: Box::new(session),
                })
            }
        }
    }

    /// Push a finalized appointment and store the receipt, ack or not.
    #[instrument(skip(self))]
    pub fn push_to_pims(&self, appointment_id: &str) -> Result<PimsReceipt, PipelineError> {
        let fail = |stage: Stage, error: ScribeError| PipelineError {
            stage,
            error,
            retained: Vec::new(),
        };
        let appointment = self
            .store
            .get_appointment(appointment_id)
            .map_err(|e| fail(Stage::Storage, e))?
            .ok_or_else(|| {
                fail(Stage::Pims, ScribeError::NotFound(format!("appointment {}", appointment_id)))
            })?;
        let patient = self
            .store
            .find_patient(&appointment.patient_key)
            .map_err(|e| fail(Stage::Storage, e))?
            .ok_or_else(|| {
                fail(Stage::Pims, ScribeError::NotFound(format!("patient {}", appointment.patient_key)))
            })?;

        let receipt = self.pims.push(&appointment, &patient);
        self.store
            .record_pims_receipt(appointment_id, &receipt)
            .map_err(|e| fail(Stage::Storage, e))?;
        Ok(receipt)
    }
}
