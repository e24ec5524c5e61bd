//! Shared types for the avatar response platform.
//!
//! This crate holds the data model exchanged between the knowledge index,
//! the voice backends, the response pipeline and the HTTP surface. It has
//! no behavior beyond small conversions so every other crate can depend on
//! it without pulling in runtime dependencies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub mod voice;

pub use voice::{SynthesisRequest, VoiceProfile};

/// Identifier of a scripted knowledge-base entry.
pub type EntryId = u64;

/// A scripted question/answer pair. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaEntry {
    pub id: EntryId,
    pub question: String,
    pub answer: String,
    /// Alternate phrasings that should resolve to the same answer.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Where the text of a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Verbatim answer from the knowledge base.
    Scripted,
    /// Produced by the language model fallback.
    Generated,
    /// A canned text used because an earlier stage failed.
    ErrorFallback,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scripted => "scripted",
            Self::Generated => "generated",
            Self::ErrorFallback => "error_fallback",
        }
    }
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio container formats understood by the voice layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
}

impl AudioFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wav => "wav",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an audio format label is not supported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported audio format: {0}")]
pub struct ParseAudioFormatError(pub String);

impl FromStr for AudioFormat {
    type Err = ParseAudioFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" | "wave" | "audio/wav" | "audio/x-wav" => Ok(Self::Wav),
            _ => Err(ParseAudioFormatError(s.to_string())),
        }
    }
}

/// The packaged result of one pipeline run. Returned to the caller and
/// then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePayload {
    pub text: String,
    pub source: ResponseSource,
    /// Encoded audio, `None` when synthesis degraded to text-only.
    pub audio: Option<Vec<u8>>,
    pub audio_format: AudioFormat,
    /// Match score in `[0, 100]`; 0 when no scripted candidate was used.
    pub confidence: f32,
}

impl ResponsePayload {
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}
