//! Transcription gateway.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{BackendError, GatewayError, GatewayResult, RetryPolicy};
use crate::config::{ScribeConfig, TranscriptionConfig};

/// Audio container formats accepted by the speech-to-text service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioEncoding {
    Wav,
    Mp3,
    M4a,
    Mp4,
    Mpeg,
    Mpga,
    Ogg,
    Webm,
    Flac,
}

impl AudioEncoding {
    /// Infer the encoding from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(AudioEncoding::Wav),
            "mp3" => Some(AudioEncoding::Mp3),
            "m4a" => Some(AudioEncoding::M4a),
            "mp4" => Some(AudioEncoding::Mp4),
            "mpeg" => Some(AudioEncoding::Mpeg),
            "mpga" => Some(AudioEncoding::Mpga),
            "ogg" | "oga" => Some(AudioEncoding::Ogg),
            "webm" => Some(AudioEncoding::Webm),
            "flac" => Some(AudioEncoding::Flac),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioEncoding::Wav => "wav",
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::M4a => "m4a",
            AudioEncoding::Mp4 => "mp4",
            AudioEncoding::Mpeg => "mpeg",
            AudioEncoding::Mpga => "mpga",
            AudioEncoding::Ogg => "ogg",
            AudioEncoding::Webm => "webm",
            AudioEncoding::Flac => "flac",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioEncoding::Wav => "audio/wav",
            AudioEncoding::Mp3 | AudioEncoding::Mpeg | AudioEncoding::Mpga => "audio/mpeg",
            AudioEncoding::M4a | AudioEncoding::Mp4 => "audio/mp4",
            AudioEncoding::Ogg => "audio/ogg",
            AudioEncoding::Webm => "audio/webm",
            AudioEncoding::Flac => "audio/flac",
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Where the audio comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Captured in memory, e.g. from an exam-room recording
    Bytes { data: Vec<u8>, encoding: AudioEncoding },
    /// Uploaded file; encoding comes from the extension
    File(PathBuf),
}

impl AudioSource {
    pub fn wav(data: Vec<u8>) -> Self {
        AudioSource::Bytes {
            data,
            encoding: AudioEncoding::Wav,
        }
    }
}

/// Validated audio handed to a [`SpeechToText`] backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub data: Vec<u8>,
    pub encoding: AudioEncoding,
    /// Name sent with multipart uploads
    pub file_name: String,
    pub language: Option<String>,
}

/// Speech-to-text service.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe one payload. Errors must say whether a retry could help.
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, BackendError>;
}

/// Validates audio, calls the backend with retry and checks the result.
#[derive(Clone)]
pub struct TranscriptionGateway {
    backend: Arc<dyn SpeechToText>,
    retry: RetryPolicy,
    limits: TranscriptionConfig,
}

impl TranscriptionGateway {
    pub fn new(backend: Arc<dyn SpeechToText>, config: &ScribeConfig) -> Self {
        Self {
            backend,
            retry: RetryPolicy::from_config(&config.retry),
            limits: config.transcription.clone(),
        }
    }

    /// Transcribe audio into non-empty text.
    pub async fn transcribe(&self, source: AudioSource) -> GatewayResult<String> {
        self.transcribe_until(source, None).await
    }

    /// Like [`transcribe`](Self::transcribe), giving up once `timeout` has
    /// elapsed across all attempts.
    pub async fn transcribe_with_timeout(
        &self,
        source: AudioSource,
        timeout: Duration,
    ) -> GatewayResult<String> {
        self.transcribe_until(source, Some(Instant::now() + timeout))
            .await
    }

    pub(crate) async fn transcribe_until(
        &self,
        source: AudioSource,
        deadline: Option<Instant>,
    ) -> GatewayResult<String> {
        let payload = self.prepare(source).await?;
        debug!(
            bytes = payload.data.len(),
            encoding = %payload.encoding,
            "Sending audio for transcription"
        );

        let backend = &self.backend;
        let payload = &payload;
        let text = self
            .retry
            .run("transcription", deadline, |_| async move {
                let text = backend.transcribe(payload).await?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(BackendError::Transient("empty transcript returned".into()));
                }
                Ok::<_, BackendError>(text.to_string())
            })
            .await
            .map_err(|e| GatewayError::TranscriptionUnavailable {
                attempts: e.attempts,
                last_error: e.last_error,
            })?;

        info!(chars = text.len(), "Transcription complete");
        Ok(text)
    }

    /// Read and validate the audio without calling the backend.
    pub async fn prepare(&self, source: AudioSource) -> GatewayResult<AudioPayload> {
        let (data, encoding, file_name) = match source {
            AudioSource::Bytes { data, encoding } => {
                let file_name = format!("audio.{}", encoding.extension());
                (data, encoding, file_name)
            }
            AudioSource::File(path) => {
                let encoding = encoding_for_path(&path)?;
                let size = tokio::fs::metadata(&path).await?.len();
                self.check_size(size)?;
                let data = tokio::fs::read(&path).await?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("audio.{}", encoding.extension()));
                (data, encoding, file_name)
            }
        };

        self.check_size(data.len() as u64)?;
        if encoding == AudioEncoding::Wav {
            self.check_wav_duration(&data)?;
        }

        Ok(AudioPayload {
            data,
            encoding,
            file_name,
            language: self.limits.language.clone(),
        })
    }

    fn check_size(&self, size: u64) -> GatewayResult<()> {
        if size == 0 {
            return Err(GatewayError::EmptyInput("audio payload is empty".into()));
        }
        if size > self.limits.max_audio_bytes {
            return Err(GatewayError::InputTooLarge {
                what: "audio bytes",
                actual: size,
                limit: self.limits.max_audio_bytes,
            });
        }
        Ok(())
    }

    fn check_wav_duration(&self, data: &[u8]) -> GatewayResult<()> {
        let reader = hound::WavReader::new(Cursor::new(data))
            .map_err(|e| GatewayError::UnsupportedAudioFormat(format!("invalid WAV data: {}", e)))?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(GatewayError::UnsupportedAudioFormat(
                "WAV header has zero sample rate".into(),
            ));
        }
        if reader.duration() == 0 {
            return Err(GatewayError::EmptyInput("WAV contains no audio frames".into()));
        }
        // duration() is in frames, i.e. samples per channel
        let seconds = u64::from(reader.duration()) / u64::from(spec.sample_rate);
        if seconds > self.limits.max_audio_seconds {
            return Err(GatewayError::InputTooLarge {
                what: "audio seconds",
                actual: seconds,
                limit: self.limits.max_audio_seconds,
            });
        }
        Ok(())
    }
}

fn encoding_for_path(path: &Path) -> GatewayResult<AudioEncoding> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(AudioEncoding::from_extension)
        .ok_or_else(|| GatewayError::UnsupportedAudioFormat(path.display().to_string()))
}
