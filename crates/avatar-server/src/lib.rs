//! Avatar server library logic.

pub mod api;
pub mod config;
pub mod middleware;

use avatar_knowledge::{KnowledgeBase, KnowledgeHandle};
use avatar_pipeline::{Backends, Orchestrator};
use avatar_types::VoiceProfile;
use avatar_voice::VoiceRegistry;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use config::Config;
use middleware::RateLimiter;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Backend descriptions reported by `/health`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackendStatus {
    pub tts: String,
    pub stt: String,
    pub llm: String,
}

impl BackendStatus {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tts: config.tts.binary.display().to_string(),
            stt: config.stt.binary.display().to_string(),
            llm: if config.fallback.enabled {
                format!("ollama:{}", config.fallback.model)
            } else {
                "disabled".to_string()
            },
        }
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The response pipeline, including the live knowledge base.
    pub orchestrator: Arc<Orchestrator>,
    /// Source re-read by `/admin/reload-knowledge`.
    pub knowledge_path: PathBuf,
    /// Reference voices addressable by id.
    pub voices: VoiceRegistry,
    /// Profile id used when a request names none (or an unknown one).
    pub default_voice: Option<String>,
    /// Rate limiter state.
    pub rate_limiter: RateLimiter,
    /// Requests per client IP per minute; 0 disables limiting.
    pub rate_limit_per_minute: u32,
    /// Maximum request body size.
    pub max_body_bytes: usize,
    pub backends: BackendStatus,
}

impl AppState {
    /// Wires a state from configuration, an already loaded knowledge base
    /// and the model backends.
    pub fn from_config(config: &Config, knowledge: KnowledgeBase, backends: Backends) -> Self {
        let orchestrator = Orchestrator::new(
            KnowledgeHandle::new(knowledge),
            backends,
            config.pipeline_settings(),
        );
        Self {
            orchestrator: Arc::new(orchestrator),
            knowledge_path: config.knowledge.path.clone(),
            voices: VoiceRegistry::from_profiles(config.voices.iter().cloned()),
            default_voice: config.tts.default_voice.clone(),
            rate_limiter: RateLimiter::new(),
            rate_limit_per_minute: config.server.rate_limit_per_minute,
            max_body_bytes: config.server.max_body_bytes,
            backends: BackendStatus::from_config(config),
        }
    }

    /// Resolves a requested profile id. Unknown ids fall back to the
    /// configured default voice, and no default means the engine's own
    /// voice.
    pub fn resolve_voice(&self, requested: Option<&str>) -> Option<VoiceProfile> {
        if let Some(id) = requested.filter(|id| !id.trim().is_empty()) {
            match self.voices.get_profile(id) {
                Some(profile) => return Some(profile),
                None => tracing::warn!(voice_profile = id, "unknown voice profile, using default"),
            }
        }
        match &self.default_voice {
            Some(id) => self.voices.get_profile(id),
            None => None,
        }
    }
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .route("/", get(api::index_handler))
        .route("/health", get(api::health_handler))
        .route("/chat", post(api::chat_handler))
        .route("/transcribe", post(api::transcribe_handler))
        .route("/tts", post(api::tts_handler))
        .route("/qa-search", post(api::qa_search_handler))
        .route(
            "/admin/reload-knowledge",
            post(api::reload_knowledge_handler),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(axum::middleware::from_fn(middleware::rate_limit_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
