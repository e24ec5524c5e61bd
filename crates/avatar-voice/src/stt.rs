use crate::audio;
use crate::config::SttConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use avatar_types::AudioFormat;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Maximum audio input size for STT (10 MiB). Prevents OOM from oversized payloads.
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// A recognition model: WAV stream in, raw transcript out.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    async fn recognize(&self, wav: &[u8]) -> Result<String, VoiceError>;
}

/// Audio in a declared container format in, text out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], format: AudioFormat) -> Result<String, VoiceError>;
}

/// Runs a whisper.cpp compatible CLI against a temporary WAV file.
#[derive(Debug, Clone)]
pub struct CommandRecognitionEngine {
    binary: PathBuf,
    model_path: PathBuf,
    language: Option<String>,
    timeout: Duration,
}

impl CommandRecognitionEngine {
    pub fn new(model_path: impl Into<PathBuf>, binary: impl Into<PathBuf>) -> Self {
        Self::from_config(&SttConfig {
            binary: binary.into(),
            model_path: model_path.into(),
            ..SttConfig::default()
        })
    }

    pub fn from_config(config: &SttConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            model_path: config.model_path.clone(),
            language: config.language.clone(),
            timeout: config.timeout(),
        }
    }
}

/// Drops whisper's bracketed non-speech markers and joins lines.
fn clean_transcript(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !(line.starts_with('[') && line.ends_with(']')))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl RecognitionEngine for CommandRecognitionEngine {
    async fn recognize(&self, wav: &[u8]) -> Result<String, VoiceError> {
        let input = tempfile::Builder::new()
            .prefix("avatar-stt-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| VoiceError::Transcription(format!("Failed to create temp file: {}", e)))?;
        tokio::fs::write(input.path(), wav)
            .await
            .map_err(|e| VoiceError::Transcription(format!("Failed to write temp file: {}", e)))?;

        // -m <model> -f <file> -nt (no timestamps) -np (no progress prints)
        let mut command = Command::new(&self.binary);
        command
            .arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg(input.path())
            .arg("-nt")
            .arg("-np");
        if let Some(language) = &self.language {
            command.arg("-l").arg(language);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| VoiceError::Transcription(format!("Failed to spawn STT binary: {}", e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| VoiceError::Timeout {
                stage: "recognition engine",
                after: self.timeout,
            })?
            .map_err(|e| VoiceError::Transcription(format!("Failed to read stdout: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Transcription(format!(
                "STT binary failed: {}",
                stderr.trim()
            )));
        }

        Ok(clean_transcript(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Rejects unusable recordings before they reach the [`RecognitionEngine`].
#[derive(Clone)]
pub struct SpeechTranscriber {
    engine: Arc<dyn RecognitionEngine>,
    silence_threshold: f32,
}

impl std::fmt::Debug for SpeechTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechTranscriber")
            .field("silence_threshold", &self.silence_threshold)
            .finish_non_exhaustive()
    }
}

impl SpeechTranscriber {
    pub fn new(engine: Arc<dyn RecognitionEngine>, config: &SttConfig) -> Self {
        Self {
            engine,
            silence_threshold: config.silence_threshold,
        }
    }
}

#[async_trait]
impl Transcriber for SpeechTranscriber {
    async fn transcribe(&self, audio: &[u8], format: AudioFormat) -> Result<String, VoiceError> {
        if audio.is_empty() {
            return Err(VoiceError::SilentAudio);
        }
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::Transcription(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_STT_INPUT_BYTES
            )));
        }

        match format {
            AudioFormat::Wav => {
                audio::inspect(audio).map_err(|e| {
                    VoiceError::UnsupportedFormat(format!("payload is not a WAV stream: {}", e))
                })?;
            }
        }

        let peak = audio::peak_amplitude(audio)?;
        if peak < self.silence_threshold {
            tracing::debug!(peak, threshold = self.silence_threshold, "rejecting silent audio");
            return Err(VoiceError::SilentAudio);
        }

        let text = self.engine.recognize(audio).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceError::NoSpeech);
        }
        Ok(text.to_string())
    }
}
