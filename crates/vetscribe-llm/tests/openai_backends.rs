use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vetscribe_core::{
    AudioEncoding, AudioPayload, BackendError, GenerationRequest, NoteContext,
    NoteGenerationGateway, ScribeConfig, SpeechToText, TemplateKind, TextGenerator,
};
use vetscribe_llm::{ChatGenerator, OpenAiConfig, WhisperTranscriber};

fn config(server: &MockServer) -> OpenAiConfig {
    OpenAiConfig::new("test-key").with_base_url(server.uri())
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}
        ]
    })
}

fn payload() -> AudioPayload {
    AudioPayload {
        data: vec![0u8; 128],
        encoding: AudioEncoding::Mp3,
        file_name: "visit.mp3".into(),
        language: Some("en".into()),
    }
}

#[tokio::test]
async fn test_whisper_transcription() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"text": "Fractured canine tooth 104, mild."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transcriber = WhisperTranscriber::new(config(&server)).unwrap();
    let text = transcriber.transcribe(&payload()).await.unwrap();
    assert_eq!(text, "Fractured canine tooth 104, mild.");
}

#[tokio::test]
async fn test_whisper_rate_limit_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
        )
        .mount(&server)
        .await;

    let transcriber = WhisperTranscriber::new(config(&server)).unwrap();
    let err = transcriber.transcribe(&payload()).await.unwrap_err();
    assert_eq!(err, BackendError::Transient("HTTP 429: Rate limit reached".into()));
}

#[tokio::test]
async fn test_chat_generation_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "gpt-4", "max_tokens": 1500})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Subject: Max's visit")))
        .expect(1)
        .mount(&server)
        .await;

    let generator = ChatGenerator::new(config(&server)).unwrap();
    let text = generator
        .generate(&GenerationRequest {
            kind: TemplateKind::Email,
            prompt: "Write an email.".into(),
        })
        .await
        .unwrap();
    assert_eq!(text, "Subject: Max's visit");
}

#[tokio::test]
async fn test_bad_key_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Incorrect API key provided"}})),
        )
        .mount(&server)
        .await;

    let generator = ChatGenerator::new(config(&server)).unwrap();
    let err = generator
        .generate(&GenerationRequest {
            kind: TemplateKind::Soap,
            prompt: "x".into(),
        })
        .await
        .unwrap_err();
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_gateway_retries_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "Subjective:\nBad breath.\nObjective:\n104 fractured.\nAssessment:\nFracture.\nPlan:\nRadiographs.",
        )))
        .mount(&server)
        .await;

    let mut scribe_config = ScribeConfig::default();
    scribe_config.retry.initial_backoff_ms = 10;
    scribe_config.retry.max_backoff_ms = 10;
    let generator = Arc::new(ChatGenerator::new(config(&server)).unwrap());
    let gateway = NoteGenerationGateway::new(generator, &scribe_config);

    let note = gateway
        .generate("soap", "Owner reports bad breath.", &NoteContext::default())
        .await
        .unwrap();
    assert_eq!(note.section("Plan"), Some("Radiographs."));
}
