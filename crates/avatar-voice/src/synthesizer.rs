//! Request-level speech synthesis.

use crate::audio;
use crate::config::TtsConfig;
use crate::error::VoiceError;
use crate::profiles::validate_reference;
use crate::text::{split_for_synthesis, verbalize};
use crate::tts::SpeechEngine;
use async_trait::async_trait;
use avatar_types::{AudioFormat, SynthesisRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Encoded audio and its container format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// Text (+ optional reference voice) in, encoded audio out.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio, VoiceError>;
}

/// Wraps a [`SpeechEngine`] with reference validation, text rewriting and
/// sentence chunking.
#[derive(Clone)]
pub struct SpeechSynthesizer {
    engine: Arc<dyn SpeechEngine>,
    chunk_max_chars: usize,
    sentence_gap: Duration,
}

impl std::fmt::Debug for SpeechSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechSynthesizer")
            .field("chunk_max_chars", &self.chunk_max_chars)
            .field("sentence_gap", &self.sentence_gap)
            .finish_non_exhaustive()
    }
}

impl SpeechSynthesizer {
    pub fn new(engine: Arc<dyn SpeechEngine>, config: &TtsConfig) -> Self {
        Self {
            engine,
            chunk_max_chars: config.chunk_max_chars,
            sentence_gap: config.sentence_gap(),
        }
    }

    /// Synthesizes a short phrase so model weights are resident before the
    /// first real request. Failures are logged and otherwise ignored.
    pub async fn warm_up(&self) {
        let started = Instant::now();
        let request = SynthesisRequest::default_voice("Hello, how can I assist you today?");
        match self.synthesize(&request).await {
            Ok(audio) => tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                bytes = audio.bytes.len(),
                "TTS warm-up completed"
            ),
            Err(e) => tracing::warn!(error = %e, "TTS warm-up failed"),
        }
    }
}

#[async_trait]
impl Synthesizer for SpeechSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio, VoiceError> {
        let spoken = verbalize(request.text.trim());
        let chunks = split_for_synthesis(&spoken, self.chunk_max_chars);
        if chunks.is_empty() {
            return Err(VoiceError::Synthesis("nothing to synthesize".to_string()));
        }

        let reference = match &request.voice_profile {
            Some(profile) => Some(validate_reference(profile).await?),
            None => None,
        };

        let mut segments = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            tracing::debug!(chunk = i, chars = chunk.chars().count(), "rendering speech chunk");
            segments.push(self.engine.render(chunk, reference.as_deref()).await?);
        }

        let bytes = if segments.len() == 1 {
            segments.pop().unwrap_or_default()
        } else {
            audio::concat_with_gaps(&segments, self.sentence_gap)?
        };

        Ok(SynthesizedAudio {
            bytes,
            format: AudioFormat::Wav,
        })
    }
}
