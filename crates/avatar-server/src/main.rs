//! Avatar server binary.
//!
//! Loads the knowledge base, wires the speech and language-model backends
//! and serves the HTTP API with structured logging and graceful shutdown on
//! SIGTERM/SIGINT.

use avatar_pipeline::{Backends, OllamaClient};
use avatar_server::{app, config, AppState};
use avatar_voice::{
    CommandRecognitionEngine, CommandSpeechEngine, SpeechSynthesizer, SpeechTranscriber,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("AVATAR_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration: the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Knowledge base: without one there is nothing to serve.
    let knowledge = avatar_knowledge::load(&config.knowledge.path)
        .expect("failed to load knowledge base: check knowledge.path in config");

    // Model backends
    let synthesizer = Arc::new(SpeechSynthesizer::new(
        Arc::new(CommandSpeechEngine::from_config(&config.tts)),
        &config.tts,
    ));
    let transcriber = Arc::new(SpeechTranscriber::new(
        Arc::new(CommandRecognitionEngine::from_config(&config.stt)),
        &config.stt,
    ));
    let language_model = OllamaClient::new(
        &config.fallback.url,
        config.fallback.model.clone(),
        config.fallback.timeout(),
    )
    .expect("failed to build language model HTTP client");
    let language_model = Arc::new(language_model);

    if config.tts.warmup {
        synthesizer.warm_up().await;
    }

    let state = AppState::from_config(
        &config,
        knowledge,
        Backends {
            transcriber,
            synthesizer,
            language_model,
        },
    );
    if let Some(id) = &state.default_voice {
        if state.voices.get_profile(id).is_none() {
            tracing::warn!(voice_profile = %id, "default voice is not among [[voices]]");
        }
    }

    // Build application
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting avatar server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address: is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    tracing::info!("avatar server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
