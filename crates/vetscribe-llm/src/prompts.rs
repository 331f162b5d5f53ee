//! Prompts for veterinary note generation.
//!
//! The user message is the rendered template from `vetscribe-core`; this
//! module adds the system message and the per-document guidance.

use serde::{Deserialize, Serialize};
use vetscribe_core::{GenerationRequest, TemplateKind};

/// System prompt shared by every document kind.
pub const SYSTEM_PROMPT: &str = r#"You are a veterinary documentation assistant working inside a small-animal clinic.

You turn appointment transcripts into accurate clinical documents.

Rules:
- Only state facts present in the transcript or the patient details. Never invent vital signs, doses or findings.
- Write "Not recorded" for information that was not captured.
- Keep drug names, doses and routes exactly as spoken.
- Refer to teeth by modified Triadan number (for example 104, 108, 309) when the transcript identifies them.
- Use the section headings requested, each on its own line followed by a colon."#;

/// Extra guidance appended to the system prompt per document kind.
pub fn kind_guidance(kind: TemplateKind) -> &'static str {
    match kind {
        TemplateKind::Soap => {
            "Audience: the veterinary team. Use concise clinical language and standard abbreviations."
        }
        TemplateKind::ClientSummary => {
            "Audience: the pet owner. Avoid jargon, explain medications and home care in plain words."
        }
        TemplateKind::Email => {
            "Audience: the pet owner. Warm, professional tone. Begin with a \"Subject:\" line."
        }
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Build the system + user message pair for a generation request.
pub fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let system = format!("{}\n\n{}", SYSTEM_PROMPT, kind_guidance(request.kind));
    vec![ChatMessage::system(system), ChatMessage::user(request.prompt.clone())]
}

/// Context prompt for speech-to-text: primes spelling of clinical terms.
pub const TRANSCRIPTION_PROMPT: &str = "Veterinary appointment. Terms: gingivitis, periodontal, \
     calculus, tooth resorption, Triadan 104, 108, 204, 309, carprofen, meloxicam, maropitant, \
     cefovecin, acepromazine.";
