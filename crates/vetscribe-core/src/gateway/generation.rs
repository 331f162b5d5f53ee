//! Note generation gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{BackendError, GatewayError, GatewayResult, RetryPolicy};
use crate::config::ScribeConfig;
use crate::models::{parse_sections, GeneratedNote, NoteContext, TemplateKind};

/// A filled-in prompt for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub kind: TemplateKind,
    pub prompt: String,
}

/// Text generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError>;
}

/// Renders templates, calls the generator with retry and checks that the
/// output carries every required section.
#[derive(Clone)]
pub struct NoteGenerationGateway {
    backend: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    max_regenerations: u32,
}

impl NoteGenerationGateway {
    pub fn new(backend: Arc<dyn TextGenerator>, config: &ScribeConfig) -> Self {
        Self {
            backend,
            retry: RetryPolicy::from_config(&config.retry),
            max_regenerations: config.generation.max_regenerations,
        }
    }

    /// Generate a document by template name ("soap", "client_summary",
    /// "email").
    pub async fn generate(
        &self,
        template_name: &str,
        transcript: &str,
        context: &NoteContext,
    ) -> GatewayResult<GeneratedNote> {
        let kind: TemplateKind = template_name
            .parse()
            .map_err(GatewayError::UnknownTemplate)?;
        self.generate_kind(kind, transcript, context).await
    }

    /// Like [`generate`](Self::generate), giving up once `timeout` has
    /// elapsed across all attempts and regenerations.
    pub async fn generate_with_timeout(
        &self,
        template_name: &str,
        transcript: &str,
        context: &NoteContext,
        timeout: Duration,
    ) -> GatewayResult<GeneratedNote> {
        let kind: TemplateKind = template_name
            .parse()
            .map_err(GatewayError::UnknownTemplate)?;
        self.generate_kind_with_timeout(kind, transcript, context, timeout)
            .await
    }

    pub async fn generate_kind(
        &self,
        kind: TemplateKind,
        transcript: &str,
        context: &NoteContext,
    ) -> GatewayResult<GeneratedNote> {
        self.generate_kind_until(kind, transcript, context, None)
            .await
    }

    pub async fn generate_kind_with_timeout(
        &self,
        kind: TemplateKind,
        transcript: &str,
        context: &NoteContext,
        timeout: Duration,
    ) -> GatewayResult<GeneratedNote> {
        self.generate_kind_until(kind, transcript, context, Some(Instant::now() + timeout))
            .await
    }

    pub(crate) async fn generate_kind_until(
        &self,
        kind: TemplateKind,
        transcript: &str,
        context: &NoteContext,
        deadline: Option<Instant>,
    ) -> GatewayResult<GeneratedNote> {
        if transcript.trim().is_empty() {
            return Err(GatewayError::EmptyInput("transcript is empty".into()));
        }

        let template = kind.spec();
        let request = GenerationRequest {
            kind,
            prompt: template.render(transcript, context),
        };
        debug!(kind = %kind, prompt_chars = request.prompt.len(), "Generating note");

        let mut pass = 0;
        loop {
            let text = self.call(&request, deadline).await?;
            let missing = template.missing_sections(&text);
            if missing.is_empty() {
                let sections = parse_sections(&text, template.required_sections);
                info!(kind = %kind, sections = sections.len(), "Note generated");
                return Ok(GeneratedNote {
                    kind,
                    text,
                    sections,
                });
            }

            if pass >= self.max_regenerations {
                warn!(kind = %kind, missing = ?missing, "Generated note still malformed");
                return Err(GatewayError::MalformedOutput { kind, missing });
            }
            pass += 1;
            warn!(
                kind = %kind,
                missing = ?missing,
                regeneration = pass,
                "Generated note is missing sections, regenerating"
            );
        }
    }

    async fn call(
        &self,
        request: &GenerationRequest,
        deadline: Option<Instant>,
    ) -> GatewayResult<String> {
        let backend = &self.backend;
        self.retry
            .run("generation", deadline, |_| async move {
                let text = backend.generate(request).await?;
                Ok::<_, BackendError>(text.trim().to_string())
            })
            .await
            .map_err(|e| GatewayError::GenerationUnavailable {
                attempts: e.attempts,
                last_error: e.last_error,
            })
    }
}
