use crate::error::GateError;
use crate::fallback::{FallbackResponder, LanguageModel};
use crate::gate::BackendGate;
use avatar_knowledge::{KnowledgeHandle, Matcher};
use avatar_types::{
    AudioFormat, EntryId, ResponsePayload, ResponseSource, SynthesisRequest, VoiceProfile,
};
use avatar_voice::{SynthesizedAudio, Synthesizer, Transcriber, VoiceError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Text(String),
    Audio { bytes: Vec<u8>, format: AudioFormat },
}

/// Canned replies used when a stage degrades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTexts {
    /// Spoken when the language model is unavailable.
    pub apology: String,
    /// Spoken when the recording could not be transcribed.
    pub not_understood: String,
}

impl Default for ResponseTexts {
    fn default() -> Self {
        Self {
            apology: "I'm sorry, I can't answer that right now. Please try again in a moment."
                .to_string(),
            not_understood: "Sorry, I didn't catch that. Could you say it again?".to_string(),
        }
    }
}

/// Per-stage and whole-request time budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub transcribe: Duration,
    pub fallback: Duration,
    pub synthesize: Duration,
    pub request: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            transcribe: Duration::from_secs(60),
            fallback: Duration::from_secs(8),
            synthesize: Duration::from_secs(60),
            request: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub matcher: Matcher,
    pub texts: ResponseTexts,
    pub timeouts: StageTimeouts,
    pub stt_max_concurrent: usize,
    pub tts_max_concurrent: usize,
    pub llm_max_concurrent: usize,
    pub fallback_enabled: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            matcher: Matcher::default(),
            texts: ResponseTexts::default(),
            timeouts: StageTimeouts::default(),
            stt_max_concurrent: 1,
            tts_max_concurrent: 1,
            llm_max_concurrent: 1,
            fallback_enabled: true,
        }
    }
}

/// The model backends the pipeline drives.
#[derive(Clone)]
pub struct Backends {
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub language_model: Arc<dyn LanguageModel>,
}

/// A scripted lookup with owned results, for callers that outlive the
/// knowledge base snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedLookup {
    pub entry_id: Option<EntryId>,
    pub answer: Option<String>,
    pub score: f32,
    pub matched: bool,
}

/// Turns user input into a [`ResponsePayload`].
///
/// Every stage has a degraded outcome, so [`respond`](Self::respond) always
/// produces a payload:
///
/// | stage fails  | result                                             |
/// |--------------|----------------------------------------------------|
/// | transcribe   | `not_understood` text, source `error_fallback`     |
/// | fallback     | `apology` text, source `error_fallback`            |
/// | voice clone  | retried once with the default voice                |
/// | synthesize   | text only, `audio = None`                          |
pub struct Orchestrator {
    knowledge: KnowledgeHandle,
    matcher: Matcher,
    transcriber: Arc<dyn Transcriber>,
    stt_gate: BackendGate,
    synthesizer: Arc<dyn Synthesizer>,
    tts_gate: BackendGate,
    fallback: FallbackResponder,
    texts: ResponseTexts,
    timeouts: StageTimeouts,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("matcher", &self.matcher)
            .field("stt_gate", &self.stt_gate)
            .field("tts_gate", &self.tts_gate)
            .field("fallback", &self.fallback)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn voice_from_gate(stage: &'static str, error: GateError) -> VoiceError {
    match error {
        GateError::Timeout { after, .. } => VoiceError::Timeout { stage, after },
        other if stage == "transcribe" => VoiceError::Transcription(other.to_string()),
        other => VoiceError::Synthesis(other.to_string()),
    }
}

impl Orchestrator {
    pub fn new(knowledge: KnowledgeHandle, backends: Backends, settings: PipelineSettings) -> Self {
        let fallback = FallbackResponder::new(backends.language_model, settings.timeouts.fallback)
            .with_max_concurrent(settings.llm_max_concurrent)
            .with_enabled(settings.fallback_enabled);
        Self {
            knowledge,
            matcher: settings.matcher,
            transcriber: backends.transcriber,
            stt_gate: BackendGate::new("stt", settings.stt_max_concurrent),
            synthesizer: backends.synthesizer,
            tts_gate: BackendGate::new("tts", settings.tts_max_concurrent),
            fallback,
            texts: settings.texts,
            timeouts: settings.timeouts,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeHandle {
        &self.knowledge
    }

    /// Runs the full pipeline. Never fails; see the type-level docs for how
    /// each stage degrades.
    pub async fn respond(&self, input: UserInput, voice: Option<VoiceProfile>) -> ResponsePayload {
        let started = Instant::now();
        let deadline = started + self.timeouts.request;

        let (text, source, confidence) = match self.resolve_text(input, deadline).await {
            Ok(utterance) => self.answer(&utterance, deadline).await,
            Err(_) => (
                self.texts.not_understood.clone(),
                ResponseSource::ErrorFallback,
                0.0,
            ),
        };

        let audio = self.speak(&text, voice, deadline).await;
        let audio_format = audio.as_ref().map(|a| a.format).unwrap_or_default();

        tracing::info!(
            stage = "done",
            elapsed_ms = elapsed_ms(started),
            source = source.as_str(),
            has_audio = audio.is_some(),
            "response ready"
        );

        ResponsePayload {
            text,
            source,
            audio: audio.map(|a| a.bytes),
            audio_format,
            confidence,
        }
    }

    /// Scores `utterance` against the live knowledge base without invoking
    /// any backend.
    pub fn lookup(&self, utterance: &str) -> ScriptedLookup {
        let kb = self.knowledge.snapshot();
        let result = self.matcher.match_utterance(utterance, &kb);
        ScriptedLookup {
            entry_id: result.entry.map(|e| e.id),
            answer: result.answer().map(str::to_string),
            score: result.score,
            matched: result.matched,
        }
    }

    /// Transcribes a recording through the serialized STT backend, bounded
    /// by the request timeout.
    pub async fn transcribe(&self, audio: Vec<u8>, format: AudioFormat) -> Result<String, VoiceError> {
        self.transcribe_by(audio, format, Instant::now() + self.timeouts.request)
            .await
    }

    /// Synthesizes through the serialized TTS backend, bounded by the
    /// request timeout. An unusable reference voice is retried once with
    /// the default voice.
    pub async fn synthesize(
        &self,
        request: SynthesisRequest,
    ) -> Result<SynthesizedAudio, VoiceError> {
        let deadline = Instant::now() + self.timeouts.request;
        self.speak_by(&request.text, request.voice_profile, deadline)
            .await
    }

    fn budget(stage: Duration, deadline: Instant) -> Duration {
        stage.min(deadline.saturating_duration_since(Instant::now()))
    }

    async fn resolve_text(&self, input: UserInput, deadline: Instant) -> Result<String, VoiceError> {
        match input {
            UserInput::Text(text) => Ok(text),
            UserInput::Audio { bytes, format } => {
                let started = Instant::now();
                let result = self.transcribe_by(bytes, format, deadline).await;
                match &result {
                    Ok(text) => tracing::info!(
                        stage = "transcribe",
                        elapsed_ms = elapsed_ms(started),
                        outcome = "ok",
                        chars = text.chars().count(),
                        "audio transcribed"
                    ),
                    Err(e) => tracing::warn!(
                        stage = "transcribe",
                        elapsed_ms = elapsed_ms(started),
                        outcome = "error",
                        error = %e,
                        "transcription failed; answering with not-understood text"
                    ),
                }
                result
            }
        }
    }

    async fn transcribe_by(
        &self,
        audio: Vec<u8>,
        format: AudioFormat,
        deadline: Instant,
    ) -> Result<String, VoiceError> {
        let transcriber = Arc::clone(&self.transcriber);
        let budget = Self::budget(self.timeouts.transcribe, deadline);
        self.stt_gate
            .run(budget, async move { transcriber.transcribe(&audio, format).await })
            .await
            .map_err(|e| voice_from_gate("transcribe", e))?
    }

    async fn synthesize_by(
        &self,
        request: SynthesisRequest,
        deadline: Instant,
    ) -> Result<SynthesizedAudio, VoiceError> {
        let synthesizer = Arc::clone(&self.synthesizer);
        let budget = Self::budget(self.timeouts.synthesize, deadline);
        self.tts_gate
            .run(budget, async move { synthesizer.synthesize(&request).await })
            .await
            .map_err(|e| voice_from_gate("synthesize", e))?
    }

    async fn answer(&self, utterance: &str, deadline: Instant) -> (String, ResponseSource, f32) {
        let started = Instant::now();
        let kb = self.knowledge.snapshot();
        let result = self.matcher.match_utterance(utterance, &kb);
        tracing::info!(
            stage = "match",
            elapsed_ms = elapsed_ms(started),
            outcome = if result.matched { "matched" } else { "no_match" },
            score = result.score,
            entry_id = ?result.entry.map(|e| e.id),
            "utterance matched against knowledge base"
        );
        if let Some(answer) = result.answer() {
            return (answer.to_string(), ResponseSource::Scripted, result.score);
        }
        let confidence = result.score;

        let started = Instant::now();
        let budget = deadline.saturating_duration_since(Instant::now());
        match self.fallback.respond_within(utterance, budget).await {
            Ok(text) => {
                tracing::info!(
                    stage = "fallback",
                    elapsed_ms = elapsed_ms(started),
                    outcome = "ok",
                    "generated fallback answer"
                );
                (text, ResponseSource::Generated, confidence)
            }
            Err(e) => {
                tracing::warn!(
                    stage = "fallback",
                    elapsed_ms = elapsed_ms(started),
                    outcome = "error",
                    error = %e,
                    "fallback failed; answering with apology"
                );
                (
                    self.texts.apology.clone(),
                    ResponseSource::ErrorFallback,
                    confidence,
                )
            }
        }
    }

    async fn speak(
        &self,
        text: &str,
        voice: Option<VoiceProfile>,
        deadline: Instant,
    ) -> Option<SynthesizedAudio> {
        let started = Instant::now();
        match self.speak_by(text, voice, deadline).await {
            Ok(audio) => {
                tracing::info!(
                    stage = "synthesize",
                    elapsed_ms = elapsed_ms(started),
                    outcome = "ok",
                    bytes = audio.bytes.len(),
                    "speech synthesized"
                );
                Some(audio)
            }
            Err(e) => {
                tracing::warn!(
                    stage = "synthesize",
                    elapsed_ms = elapsed_ms(started),
                    outcome = "error",
                    error = %e,
                    "synthesis failed; returning text only"
                );
                None
            }
        }
    }

    async fn speak_by(
        &self,
        text: &str,
        voice: Option<VoiceProfile>,
        deadline: Instant,
    ) -> Result<SynthesizedAudio, VoiceError> {
        let cloned = voice.is_some();
        let request = SynthesisRequest {
            text: text.to_string(),
            voice_profile: voice,
        };
        match self.synthesize_by(request, deadline).await {
            Err(e) if cloned && e.is_voice_profile() => {
                tracing::warn!(
                    stage = "synthesize",
                    error = %e,
                    "reference voice unusable; retrying with default voice"
                );
                self.synthesize_by(SynthesisRequest::default_voice(text), deadline)
                    .await
            }
            other => other,
        }
    }
}
