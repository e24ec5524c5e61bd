//! Voice profile and synthesis request definitions.
//!
//! A `VoiceProfile` maps a logical ID to a reference recording that the
//! synthesizer clones. Profiles are referenced by the synthesizer, never
//! copied into the synthesized output.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A voice cloning target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Unique identifier for the voice profile.
    pub id: String,
    /// Path to the reference recording (WAV).
    pub reference_audio_path: PathBuf,
}

impl VoiceProfile {
    pub fn new(id: impl Into<String>, reference_audio_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            reference_audio_path: reference_audio_path.into(),
        }
    }
}

/// Text to be spoken, optionally in a cloned voice.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_profile: Option<VoiceProfile>,
}

impl SynthesisRequest {
    /// A request spoken in the backend's default voice.
    pub fn default_voice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_profile: None,
        }
    }

    pub fn with_voice(text: impl Into<String>, profile: VoiceProfile) -> Self {
        Self {
            text: text.into(),
            voice_profile: Some(profile),
        }
    }
}
