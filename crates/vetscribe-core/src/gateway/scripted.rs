//! Scripted backends.
//!
//! Replay a fixed list of responses, one per call, and count the calls.
//! Used by tests and for running the pipeline offline.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{AudioPayload, BackendError, GenerationRequest, SpeechToText, TextGenerator};
use crate::models::TemplateKind;

struct Script<T> {
    responses: Mutex<VecDeque<Result<T, BackendError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl<T> Script<T> {
    fn new(responses: Vec<Result<T, BackendError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    async fn next(&self) -> Result<T, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        next.unwrap_or_else(|| Err(BackendError::Permanent("script exhausted".into())))
    }
}

/// Speech-to-text backend that replays scripted results.
pub struct ScriptedSpeechToText {
    script: Script<String>,
}

impl ScriptedSpeechToText {
    pub fn new(responses: Vec<Result<String, BackendError>>) -> Self {
        Self {
            script: Script::new(responses),
        }
    }

    /// Sleep before every response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.script.delay = Some(delay);
        self
    }

    /// Number of calls so far.
    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechToText for ScriptedSpeechToText {
    async fn transcribe(&self, _audio: &AudioPayload) -> Result<String, BackendError> {
        self.script.next().await
    }
}

/// Text generator that replays scripted results and records each request.
pub struct ScriptedGenerator {
    script: Script<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, BackendError>>) -> Self {
        Self {
            script: Script::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.script.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    /// Kinds requested so far, in call order.
    pub fn requested_kinds(&self) -> Vec<TemplateKind> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|r| r.kind)
            .collect()
    }

    /// Prompt of the most recent request.
    pub fn last_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .map(|r| r.prompt.clone())
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        self.script.next().await
    }
}
