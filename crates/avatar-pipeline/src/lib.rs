//! Response resolution for the avatar.
//!
//! The [`Orchestrator`] takes text or a recording, answers it from the
//! scripted knowledge base when the match is confident, asks a language
//! model otherwise, and voices the result. Model backends sit behind
//! [`BackendGate`]s so each one only sees the concurrency it can handle.

pub mod error;
pub mod fallback;
pub mod gate;
pub mod orchestrator;

pub use error::{FallbackError, GateError};
pub use fallback::{FallbackResponder, LanguageModel, OllamaClient};
pub use gate::BackendGate;
pub use orchestrator::{
    Backends, Orchestrator, PipelineSettings, ResponseTexts, ScriptedLookup, StageTimeouts,
    UserInput,
};
