use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

fn default_tts_binary() -> PathBuf {
    PathBuf::from("piper")
}

fn default_reference_flag() -> String {
    "--speaker_wav".to_string()
}

fn default_tts_timeout_ms() -> u64 {
    60_000
}

fn default_chunk_max_chars() -> usize {
    400
}

fn default_sentence_gap_ms() -> u64 {
    250
}

fn default_max_concurrent() -> usize {
    1
}

fn default_stt_binary() -> PathBuf {
    PathBuf::from("whisper-cli")
}

fn default_stt_model() -> PathBuf {
    PathBuf::from("models/ggml-base.en.bin")
}

fn default_stt_timeout_ms() -> u64 {
    60_000
}

fn default_silence_threshold() -> f32 {
    0.01
}

/// Speech synthesis settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// Binary that reads text on stdin and writes audio to stdout.
    #[serde(default = "default_tts_binary")]
    pub binary: PathBuf,

    /// Extra arguments passed before the reference voice flag.
    #[serde(default)]
    pub args: Vec<String>,

    /// Flag that introduces the reference recording for voice cloning.
    #[serde(default = "default_reference_flag")]
    pub reference_flag: String,

    /// When set, stdout is raw s16le mono PCM at this rate and is wrapped
    /// into WAV. When unset, stdout must already be a WAV stream.
    #[serde(default)]
    pub raw_sample_rate: Option<u32>,

    /// Per-chunk process timeout.
    #[serde(default = "default_tts_timeout_ms")]
    pub timeout_ms: u64,

    /// Replies longer than this many characters are split at sentence
    /// boundaries. 0 disables chunking.
    #[serde(default = "default_chunk_max_chars")]
    pub chunk_max_chars: usize,

    /// Silence inserted between chunks.
    #[serde(default = "default_sentence_gap_ms")]
    pub sentence_gap_ms: u64,

    /// Voice profile used when a request does not name one.
    #[serde(default)]
    pub default_voice: Option<String>,

    /// Run one synthesis at start-up so the first request is not slow.
    #[serde(default)]
    pub warmup: bool,

    /// Concurrent synthesis calls allowed against the backend.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            binary: default_tts_binary(),
            args: Vec::new(),
            reference_flag: default_reference_flag(),
            raw_sample_rate: None,
            timeout_ms: default_tts_timeout_ms(),
            chunk_max_chars: default_chunk_max_chars(),
            sentence_gap_ms: default_sentence_gap_ms(),
            default_voice: None,
            warmup: false,
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl TtsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sentence_gap(&self) -> Duration {
        Duration::from_millis(self.sentence_gap_ms)
    }
}

/// Speech recognition settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SttConfig {
    /// whisper.cpp compatible CLI.
    #[serde(default = "default_stt_binary")]
    pub binary: PathBuf,

    /// Path to the GGML model passed with `-m`.
    #[serde(default = "default_stt_model")]
    pub model_path: PathBuf,

    /// Spoken language hint passed with `-l`.
    #[serde(default)]
    pub language: Option<String>,

    #[serde(default = "default_stt_timeout_ms")]
    pub timeout_ms: u64,

    /// Peak amplitude (0..1) under which a recording counts as silent.
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,

    /// Concurrent recognition calls allowed against the backend.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            binary: default_stt_binary(),
            model_path: default_stt_model(),
            language: None,
            timeout_ms: default_stt_timeout_ms(),
            silence_threshold: default_silence_threshold(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl SttConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tables_keep_defaults() {
        let tts: TtsConfig = toml::from_str("binary = \"/opt/xtts/speak\"\nwarmup = true").unwrap();
        assert_eq!(tts.binary, PathBuf::from("/opt/xtts/speak"));
        assert!(tts.warmup);
        assert_eq!(tts.chunk_max_chars, 400);
        assert_eq!(tts.reference_flag, "--speaker_wav");

        let stt: SttConfig = toml::from_str("language = \"en\"").unwrap();
        assert_eq!(stt.language.as_deref(), Some("en"));
        assert_eq!(stt.timeout(), Duration::from_secs(60));
    }
}
