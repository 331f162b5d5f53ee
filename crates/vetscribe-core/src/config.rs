//! Runtime configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! [dental]
//! default_scheme = "canine"
//! referral_threshold = "severe"
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 500
//! multiplier = 2.0
//! max_backoff_ms = 8000
//! attempt_timeout_ms = 60000
//!
//! [transcription]
//! max_audio_bytes = 26214400
//! max_audio_seconds = 1800
//! language = "en"
//!
//! [generation]
//! max_regenerations = 1
//!
//! [pims]
//! system = "ezy_vet"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::PimsSystem;
use crate::vocab::{NumberingScheme, Severity};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ScribeConfig {
    #[serde(default)]
    pub dental: DentalConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub pims: PimsConfig,
}

/// Dental charting settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DentalConfig {
    /// Scheme for species without their own numbering
    #[serde(default = "default_scheme")]
    pub default_scheme: NumberingScheme,
    /// Teeth at or above this severity get a referral recommendation
    #[serde(default = "default_referral_threshold")]
    pub referral_threshold: Severity,
}

/// Retry policy for both gateways.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Per-attempt timeout
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: u64,
    /// Upper bound on recording length, checked for WAV input
    #[serde(default = "default_max_audio_seconds")]
    pub max_audio_seconds: u64,
    /// Language hint passed to the backend ("en", "es", ...)
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Regenerations allowed when required sections are missing
    #[serde(default = "default_max_regenerations")]
    pub max_regenerations: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PimsConfig {
    #[serde(default = "default_pims_system")]
    pub system: PimsSystem,
}

// Default functions
fn default_scheme() -> NumberingScheme {
    NumberingScheme::Canine
}

fn default_referral_threshold() -> Severity {
    Severity::Severe
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_attempt_timeout_ms() -> u64 {
    60_000
}

fn default_max_audio_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_max_audio_seconds() -> u64 {
    1_800
}

fn default_max_regenerations() -> u32 {
    1
}

fn default_pims_system() -> PimsSystem {
    PimsSystem::EzyVet
}

impl Default for DentalConfig {
    fn default() -> Self {
        Self {
            default_scheme: default_scheme(),
            referral_threshold: default_referral_threshold(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            max_audio_bytes: default_max_audio_bytes(),
            max_audio_seconds: default_max_audio_seconds(),
            language: None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_regenerations: default_max_regenerations(),
        }
    }
}

impl Default for PimsConfig {
    fn default() -> Self {
        Self {
            system: default_pims_system(),
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl ScribeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ScribeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if !(retry.multiplier.is_finite() && retry.multiplier >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "retry.multiplier must be >= 1.0, got {}",
                retry.multiplier
            )));
        }
        if retry.max_backoff_ms < retry.initial_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.max_backoff_ms must not be below retry.initial_backoff_ms".into(),
            ));
        }
        if retry.attempt_timeout_ms == 0 {
            return Err(ConfigError::Invalid("retry.attempt_timeout_ms must be positive".into()));
        }
        if self.transcription.max_audio_bytes == 0 || self.transcription.max_audio_seconds == 0 {
            return Err(ConfigError::Invalid("transcription limits must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ScribeConfig::from_toml_str("").unwrap();
        assert_eq!(config, ScribeConfig::default());
        assert_eq!(config.dental.referral_threshold, Severity::Severe);
        assert_eq!(config.dental.default_scheme, NumberingScheme::Canine);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.transcription.max_audio_bytes, 26_214_400);
        assert_eq!(config.generation.max_regenerations, 1);
        assert_eq!(config.pims.system, PimsSystem::EzyVet);
    }

    #[test]
    fn test_partial_override() {
        let config = ScribeConfig::from_toml_str(
            r#"
            [dental]
            referral_threshold = "moderate"

            [retry]
            max_attempts = 5

            [transcription]
            language = "en"

            [pims]
            system = "cornerstone"
            "#,
        )
        .unwrap();
        assert_eq!(config.dental.referral_threshold, Severity::Moderate);
        assert_eq!(config.dental.default_scheme, NumberingScheme::Canine);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.transcription.language.as_deref(), Some("en"));
        assert_eq!(config.pims.system, PimsSystem::Cornerstone);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ScribeConfig::from_toml_str("[retry]\nmax_attempts = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ScribeConfig::from_toml_str("[retry]\nmultiplier = 0.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ScribeConfig::from_toml_str("[dental]\nreferral_threshold = \"dire\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vetscribe.toml");
        std::fs::write(&path, "[generation]\nmax_regenerations = 2\n").unwrap();
        let config = ScribeConfig::from_file(&path).unwrap();
        assert_eq!(config.generation.max_regenerations, 2);

        assert!(matches!(
            ScribeConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
