//! OpenAI-compatible backends for VetScribe.
//!
//! This crate provides the speech-to-text and note generation services
//! behind the `SpeechToText` and `TextGenerator` traits of `vetscribe-core`,
//! using the Whisper transcription and chat completion HTTP APIs.

pub mod openai;
pub mod prompts;
pub mod response;

pub use openai::*;
pub use prompts::*;
pub use response::*;
