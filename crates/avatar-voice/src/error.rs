use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    /// The requested reference voice is missing, unreadable or not audio.
    #[error("voice profile error: {0}")]
    VoiceProfile(String),

    #[error("TTS error: {0}")]
    Synthesis(String),

    #[error("STT error: {0}")]
    Transcription(String),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("audio is empty or silent")]
    SilentAudio,

    #[error("no speech recognized")]
    NoSpeech,

    #[error("{stage} timed out after {} ms", .after.as_millis())]
    Timeout {
        stage: &'static str,
        after: Duration,
    },

    #[error("audio container error: {0}")]
    Audio(#[from] hound::Error),
}

impl VoiceError {
    pub fn is_voice_profile(&self) -> bool {
        matches!(self, Self::VoiceProfile(_))
    }

    /// True when the input itself was unusable, as opposed to a backend
    /// failing on good input.
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_) | Self::SilentAudio | Self::NoSpeech | Self::Audio(_)
        )
    }
}
