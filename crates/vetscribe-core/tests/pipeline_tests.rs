//! End-to-end pipeline scenarios against scripted backends.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use vetscribe_core::gateway::{ScriptedGenerator, ScriptedSpeechToText};
use vetscribe_core::{
    AudioEncoding, AudioSource, BackendError, DocumentationPipeline, PatientDetails,
    RecordStore, ScribeConfig, ScribeError, SessionOutput, Species, Stage, TemplateKind,
    TranscriptSource, VisitDetails,
};

const SOAP_WITHOUT_PLAN: &str =
    "Subjective:\nBad breath.\nObjective:\n104 fractured.\nAssessment:\nFracture.";
const SOAP: &str = "Subjective:\nBad breath.\nObjective:\n104 fractured, mild.\n\
                    Assessment:\nFracture.\nPlan:\nRadiographs.";

fn max() -> PatientDetails {
    PatientDetails::new("Max", Species::Canine).with_owner("Jane Doe")
}

fn mp3() -> AudioSource {
    AudioSource::Bytes {
        data: vec![0u8; 64],
        encoding: AudioEncoding::Mp3,
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn build(
    stt: Arc<ScriptedSpeechToText>,
    generator: Arc<ScriptedGenerator>,
) -> DocumentationPipeline {
    init_tracing();
    DocumentationPipeline::new(
        stt,
        generator,
        RecordStore::open_in_memory().unwrap(),
        ScribeConfig::default(),
    )
}

#[tokio::test]
async fn test_missing_section_regenerates_once() {
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(SOAP_WITHOUT_PLAN.into()),
        Ok(SOAP_WITHOUT_PLAN.into()),
    ]));
    let pipeline = build(Arc::new(ScriptedSpeechToText::new(vec![])), generator.clone());

    let mut session = pipeline.start_session(max(), VisitDetails::default());
    session
        .supply_transcript("Owner reports bad breath. Fractured 104.", TranscriptSource::Manual)
        .unwrap();

    let err = pipeline.generate_notes(&mut session).await.unwrap_err();
    assert_eq!(err.stage, Stage::Generation);
    match err.error {
        ScribeError::MalformedOutput { kind, missing } => {
            assert_eq!(kind, TemplateKind::Soap);
            assert_eq!(missing, vec!["Plan".to_string()]);
        }
        other => panic!("expected MalformedOutput, got {:?}", other),
    }
    assert_eq!(err.retained, vec![SessionOutput::Transcript]);
    assert_eq!(generator.calls(), 2);
    assert!(session.appointment().soap_note.is_none());
}

#[tokio::test]
async fn test_regeneration_recovers() {
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(SOAP_WITHOUT_PLAN.into()),
        Ok(SOAP.into()),
        Ok("Visit Summary:\nExam.\nHome Care:\nRest.\nFollow-Up:\nNone.".into()),
    ]));
    let pipeline = build(Arc::new(ScriptedSpeechToText::new(vec![])), generator.clone());

    let mut session = pipeline.start_session(max(), VisitDetails::default());
    session
        .supply_transcript("Fractured 104, mild.", TranscriptSource::Manual)
        .unwrap();

    let (soap, summary) = pipeline.generate_notes(&mut session).await.unwrap();
    assert_eq!(soap.section("Plan"), Some("Radiographs."));
    assert_eq!(summary.section("Follow-Up"), Some("None."));
    assert_eq!(
        generator.requested_kinds(),
        vec![TemplateKind::Soap, TemplateKind::Soap, TemplateKind::ClientSummary]
    );
    assert_eq!(
        session.retained(),
        vec![
            SessionOutput::Transcript,
            SessionOutput::SoapNote,
            SessionOutput::ClientSummary
        ]
    );
}

#[tokio::test]
async fn test_email_without_subject_is_rejected() {
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok("Dear Jane,\nMax did well.".into()),
        Ok("Dear Jane,\nMax did well today.".into()),
    ]));
    let pipeline = build(Arc::new(ScriptedSpeechToText::new(vec![])), generator.clone());

    let mut session = pipeline.start_session(max(), VisitDetails::default());
    session
        .supply_transcript("Exam.", TranscriptSource::Manual)
        .unwrap();

    let err = pipeline.generate_client_email(&mut session).await.unwrap_err();
    assert!(matches!(
        err.error,
        ScribeError::MalformedOutput {
            kind: TemplateKind::Email,
            ..
        }
    ));
    assert_eq!(generator.calls(), 2);
    assert!(session.appointment().client_email.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_transcription_retries_exhausted() {
    let stt = Arc::new(ScriptedSpeechToText::new(vec![
        Err(BackendError::Transient("HTTP 503: overloaded".into())),
        Err(BackendError::Transient("HTTP 503: overloaded".into())),
        Err(BackendError::Transient("HTTP 503: overloaded".into())),
    ]));
    let pipeline = build(stt.clone(), Arc::new(ScriptedGenerator::new(vec![])));

    let mut session = pipeline.start_session(max(), VisitDetails::default());
    let err = pipeline.transcribe(&mut session, mp3()).await.unwrap_err();

    assert_eq!(err.stage, Stage::Transcription);
    match err.error {
        ScribeError::TranscriptionUnavailable {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("503"));
        }
        other => panic!("expected TranscriptionUnavailable, got {:?}", other),
    }
    assert_eq!(stt.calls(), 3);
    assert!(session.transcript().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_transient_then_success() {
    let stt = Arc::new(ScriptedSpeechToText::new(vec![
        Err(BackendError::Transient("connection reset".into())),
        Ok("Gingivitis at 409.".into()),
    ]));
    let pipeline = build(stt.clone(), Arc::new(ScriptedGenerator::new(vec![])));

    let mut session = pipeline.start_session(max(), VisitDetails::default());
    pipeline.transcribe(&mut session, mp3()).await.unwrap();

    assert_eq!(session.transcript(), Some("Gingivitis at 409."));
    assert_eq!(
        session.appointment().transcript_source,
        Some(TranscriptSource::Recorded)
    );
    assert_eq!(stt.calls(), 2);
}

#[tokio::test]
async fn test_uploaded_file_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("visit.mp3");
    std::fs::write(&path, vec![0u8; 64]).unwrap();

    let stt = Arc::new(ScriptedSpeechToText::new(vec![Ok("Calculus on 108.".into())]));
    let pipeline = build(stt, Arc::new(ScriptedGenerator::new(vec![])));

    let mut session = pipeline.start_session(max(), VisitDetails::default());
    pipeline
        .transcribe(&mut session, AudioSource::File(path))
        .await
        .unwrap();
    assert_eq!(
        session.appointment().transcript_source,
        Some(TranscriptSource::Uploaded)
    );

    let analysis = pipeline.analyze_dental(&mut session).unwrap();
    assert!(!analysis.referral_recommended);
    assert_eq!(session.retained(), vec![SessionOutput::Transcript, SessionOutput::DentalChart]);
}

#[test]
fn test_feline_chart_rejects_invalid_tooth() {
    let pipeline = build(
        Arc::new(ScriptedSpeechToText::new(vec![])),
        Arc::new(ScriptedGenerator::new(vec![])),
    );
    let mut session = pipeline.start_session(
        PatientDetails::new("Luna", Species::Feline).with_owner("Sam Lee"),
        VisitDetails::default(),
    );
    session
        .supply_transcript("Fractured 105.", TranscriptSource::Manual)
        .unwrap();

    let err = pipeline.analyze_dental(&mut session).unwrap_err();
    assert_eq!(err.stage, Stage::Charting);
    assert!(matches!(
        err.error,
        ScribeError::InvalidToothReference { tooth: 105, .. }
    ));
    assert!(session.appointment().dental_chart.is_none());
}

#[tokio::test]
async fn test_finalized_session_cannot_be_retranscribed() {
    let pipeline = build(
        Arc::new(ScriptedSpeechToText::new(vec![])),
        Arc::new(ScriptedGenerator::new(vec![])),
    );
    let mut session = pipeline.start_session(max(), VisitDetails::default());
    session
        .supply_transcript("Exam.", TranscriptSource::Manual)
        .unwrap();
    let record = pipeline.finalize(session).unwrap();

    let mut resumed = pipeline
        .resume_session(&record.appointment.appointment_id)
        .unwrap();
    assert!(matches!(
        resumed.supply_transcript("Rewritten.", TranscriptSource::Manual),
        Err(ScribeError::TranscriptLocked(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_generation_timeout_keeps_transcript() {
    let generator = Arc::new(
        ScriptedGenerator::new(vec![Ok(SOAP.into()), Ok(SOAP.into())])
            .with_delay(Duration::from_secs(600)),
    );
    let pipeline = build(Arc::new(ScriptedSpeechToText::new(vec![])), generator.clone());

    let mut session = pipeline.start_session(max(), VisitDetails::default());
    session
        .supply_transcript("Fractured 104, mild.", TranscriptSource::Manual)
        .unwrap();

    let err = pipeline
        .generate_notes_with_timeout(&mut session, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::Generation);
    assert!(matches!(
        err.error,
        ScribeError::GenerationUnavailable { attempts: 1, .. }
    ));
    assert_eq!(err.retained, vec![SessionOutput::Transcript]);
    assert_eq!(generator.calls(), 1);
    assert_eq!(session.transcript(), Some("Fractured 104, mild."));
    assert!(session.appointment().soap_note.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_email_timeout_keeps_notes() {
    let generator = Arc::new(
        ScriptedGenerator::new(vec![Ok("Subject: Max\nDear Jane,\nAll good.".into())])
            .with_delay(Duration::from_secs(600)),
    );
    let pipeline = build(Arc::new(ScriptedSpeechToText::new(vec![])), generator);

    let mut session = pipeline.start_session(max(), VisitDetails::default());
    session
        .supply_transcript("Exam.", TranscriptSource::Manual)
        .unwrap();

    let err = pipeline
        .generate_client_email_with_timeout(&mut session, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err.error, ScribeError::GenerationUnavailable { .. }));
    assert!(session.appointment().client_email.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_transcription_timeout_allows_manual_entry() {
    let stt = Arc::new(
        ScriptedSpeechToText::new(vec![Ok("late".into())]).with_delay(Duration::from_secs(600)),
    );
    let pipeline = build(stt, Arc::new(ScriptedGenerator::new(vec![])));

    let mut session = pipeline.start_session(max(), VisitDetails::default());
    let err = pipeline
        .transcribe_with_timeout(&mut session, mp3(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::Transcription);
    assert!(matches!(err.error, ScribeError::TranscriptionUnavailable { .. }));

    session
        .supply_transcript("Typed instead.", TranscriptSource::Manual)
        .unwrap();
    assert_eq!(session.transcript(), Some("Typed instead."));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_transcription_leaves_store_untouched() {
    let stt = Arc::new(
        ScriptedSpeechToText::new(vec![Ok("Fractured 104.".into())])
            .with_delay(Duration::from_secs(600)),
    );
    let pipeline = build(stt.clone(), Arc::new(ScriptedGenerator::new(vec![])));
    let before = pipeline.store().stats().unwrap();

    let mut session = pipeline.start_session(max(), VisitDetails::default());
    let outcome =
        tokio::time::timeout(Duration::from_secs(1), pipeline.transcribe(&mut session, mp3()))
            .await;
    assert!(outcome.is_err());
    assert_eq!(stt.calls(), 1);

    assert_eq!(pipeline.store().stats().unwrap(), before);
    assert!(session.transcript().is_none());
    assert!(pipeline
        .store()
        .get_appointment(session.appointment_id())
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_generation_leaves_draft_untouched() {
    let generator = Arc::new(
        ScriptedGenerator::new(vec![Ok(SOAP.into())]).with_delay(Duration::from_secs(600)),
    );
    let pipeline = build(Arc::new(ScriptedSpeechToText::new(vec![])), generator);

    let mut session = pipeline.start_session(max(), VisitDetails::default());
    session
        .supply_transcript("Fractured 104, mild.", TranscriptSource::Manual)
        .unwrap();
    pipeline.save_draft(&session).unwrap();
    let before = pipeline.store().stats().unwrap();

    let outcome =
        tokio::time::timeout(Duration::from_secs(1), pipeline.generate_notes(&mut session)).await;
    assert!(outcome.is_err());

    assert_eq!(pipeline.store().stats().unwrap(), before);
    let stored = pipeline
        .store()
        .get_appointment(session.appointment_id())
        .unwrap()
        .unwrap();
    assert!(stored.soap_note.is_none());
    assert!(session.appointment().soap_note.is_none());
    assert_eq!(session.retained(), vec![SessionOutput::Transcript]);
}
