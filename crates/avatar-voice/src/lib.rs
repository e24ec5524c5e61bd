//! Speech synthesis and transcription for the avatar.
//!
//! The heavy models run out of process. This crate wraps them behind two
//! narrow capabilities, [`Synthesizer`] and [`Transcriber`], and adds the
//! request-level handling the models do not provide themselves: reference
//! voice validation, speech-friendly text rewriting, sentence chunking of
//! long replies with natural pauses between chunks, and rejection of empty
//! or silent recordings before they reach the recognizer.
//!
//! Engines ([`SpeechEngine`], [`RecognitionEngine`]) are the raw model
//! contracts; the default implementations spawn a configured binary
//! (Piper/XTTS-style for speech, whisper.cpp-style for recognition).

pub mod audio;
pub mod config;
pub mod error;
pub mod profiles;
pub mod stt;
pub mod synthesizer;
pub mod text;
pub mod tts;

pub use config::{SttConfig, TtsConfig};
pub use error::VoiceError;
pub use profiles::VoiceRegistry;
pub use stt::{CommandRecognitionEngine, RecognitionEngine, SpeechTranscriber, Transcriber};
pub use synthesizer::{SpeechSynthesizer, SynthesizedAudio, Synthesizer};
pub use tts::{CommandSpeechEngine, SpeechEngine};
