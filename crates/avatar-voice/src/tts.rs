use crate::audio;
use crate::config::TtsConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum text input size for one engine call (64 KiB).
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// A speech model: turns one chunk of text into a WAV stream, optionally
/// in the timbre of a reference recording.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn render(&self, text: &str, reference: Option<&Path>) -> Result<Vec<u8>, VoiceError>;
}

/// Runs a synthesis binary per call: text on stdin, audio on stdout.
///
/// With a reference recording the binary receives
/// `<reference_flag> <path>` after the configured arguments.
#[derive(Debug, Clone)]
pub struct CommandSpeechEngine {
    binary: PathBuf,
    args: Vec<String>,
    reference_flag: String,
    raw_sample_rate: Option<u32>,
    timeout: Duration,
}

impl CommandSpeechEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self::from_config(&TtsConfig {
            binary: binary.into(),
            ..TtsConfig::default()
        })
    }

    pub fn from_config(config: &TtsConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            args: config.args.clone(),
            reference_flag: config.reference_flag.clone(),
            raw_sample_rate: config.raw_sample_rate,
            timeout: config.timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SpeechEngine for CommandSpeechEngine {
    async fn render(&self, text: &str, reference: Option<&Path>) -> Result<Vec<u8>, VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Synthesis(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let mut command = Command::new(&self.binary);
        command.args(&self.args);
        if let Some(reference) = reference {
            command.arg(&self.reference_flag).arg(reference);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            VoiceError::Synthesis(format!("Failed to spawn {:?}: {}", self.binary, e))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Synthesis("Failed to open stdin".to_string()))?;
        let text_owned = text.to_string();

        // Write from a separate task so a full stdout pipe cannot deadlock us.
        let write_task = tokio::spawn(async move {
            stdin.write_all(text_owned.as_bytes()).await?;
            stdin.shutdown().await
        });

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| VoiceError::Timeout {
                stage: "speech engine",
                after: self.timeout,
            })?
            .map_err(|e| VoiceError::Synthesis(format!("Failed to wait for TTS: {}", e)))?;

        match write_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(VoiceError::Synthesis(format!(
                    "Failed to write to TTS stdin: {}",
                    e
                )))
            }
            Err(e) => return Err(VoiceError::Synthesis(format!("Stdin task failed: {}", e))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Synthesis(format!(
                "TTS exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(VoiceError::Synthesis("TTS produced no audio".to_string()));
        }

        match self.raw_sample_rate {
            Some(rate) => audio::wrap_pcm_s16le(&output.stdout, rate),
            None => {
                audio::inspect(&output.stdout).map_err(|e| {
                    VoiceError::Synthesis(format!("TTS output is not WAV: {}", e))
                })?;
                Ok(output.stdout)
            }
        }
    }
}
