//! Server configuration loading from file and environment variables.

use avatar_knowledge::{Matcher, DEFAULT_MATCH_THRESHOLD};
use avatar_pipeline::{PipelineSettings, ResponseTexts, StageTimeouts};
use avatar_types::VoiceProfile;
use avatar_voice::{SttConfig, TtsConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scripted answers source and matching policy.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Generative fallback settings.
    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub stt: SttConfig,

    /// Reference voices available for cloning.
    #[serde(default)]
    pub voices: Vec<VoiceProfile>,

    /// Canned replies and the overall request budget.
    #[serde(default)]
    pub responses: ResponsesConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body. Base64 audio is about 4/3 of the raw size.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Requests per client IP per minute. 0 disables limiting.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "avatar_pipeline=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeConfig {
    /// JSON file with the question/answer records.
    #[serde(default = "default_knowledge_path")]
    pub path: PathBuf,

    /// Minimum score (0-100) for a scripted answer.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_ollama_url")]
    pub url: String,

    #[serde(default = "default_ollama_model")]
    pub model: String,

    #[serde(default = "default_fallback_timeout_ms")]
    pub timeout_ms: u64,

    /// When false, unmatched questions get the apology text directly.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesConfig {
    #[serde(default = "default_apology")]
    pub apology: String,

    #[serde(default = "default_not_understood")]
    pub not_understood: String,

    /// Upper bound for a whole chat request, across all stages.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5000
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_rate_limit() -> u32 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_knowledge_path() -> PathBuf {
    PathBuf::from("data/qa_data.json")
}

fn default_match_threshold() -> f32 {
    DEFAULT_MATCH_THRESHOLD
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "mistral".to_string()
}

fn default_fallback_timeout_ms() -> u64 {
    8_000
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    1
}

fn default_apology() -> String {
    ResponseTexts::default().apology
}

fn default_not_understood() -> String {
    ResponseTexts::default().not_understood
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: default_knowledge_path(),
            match_threshold: default_match_threshold(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_ollama_model(),
            timeout_ms: default_fallback_timeout_ms(),
            enabled: true,
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl FallbackConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ResponsesConfig {
    fn default() -> Self {
        Self {
            apology: default_apology(),
            not_understood: default_not_understood(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Config {
    /// Pipeline policy derived from the `[knowledge]`, `[fallback]`, `[tts]`,
    /// `[stt]` and `[responses]` sections.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            matcher: Matcher::new(self.knowledge.match_threshold),
            texts: ResponseTexts {
                apology: self.responses.apology.clone(),
                not_understood: self.responses.not_understood.clone(),
            },
            timeouts: StageTimeouts {
                transcribe: self.stt.timeout(),
                fallback: self.fallback.timeout(),
                synthesize: self.tts.timeout(),
                request: Duration::from_millis(self.responses.request_timeout_ms),
            },
            stt_max_concurrent: self.stt.max_concurrent,
            tts_max_concurrent: self.tts.max_concurrent,
            llm_max_concurrent: self.fallback.max_concurrent,
            fallback_enabled: self.fallback.enabled,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `AVATAR_HOST`, `AVATAR_PORT` override `server.host` / `server.port`
/// - `AVATAR_LOG_LEVEL` overrides `logging.level`
/// - `AVATAR_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `AVATAR_QA_DATA_PATH`, `AVATAR_MATCH_THRESHOLD` override `[knowledge]`
/// - `AVATAR_OLLAMA_URL`, `AVATAR_OLLAMA_MODEL` override `[fallback]`
/// - `AVATAR_TTS_BINARY` overrides `tts.binary`
/// - `AVATAR_STT_BINARY`, `AVATAR_STT_MODEL` override `[stt]`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

/// Applies `AVATAR_*` overrides read through `var`. Unparseable values are
/// ignored.
pub fn apply_env_overrides(mut config: Config, var: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(host) = var("AVATAR_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("AVATAR_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = var("AVATAR_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("AVATAR_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(path) = var("AVATAR_QA_DATA_PATH") {
        config.knowledge.path = PathBuf::from(path);
    }
    if let Some(threshold) = var("AVATAR_MATCH_THRESHOLD") {
        if let Ok(parsed) = threshold.parse() {
            config.knowledge.match_threshold = parsed;
        }
    }
    if let Some(url) = var("AVATAR_OLLAMA_URL") {
        config.fallback.url = url;
    }
    if let Some(model) = var("AVATAR_OLLAMA_MODEL") {
        config.fallback.model = model;
    }
    if let Some(binary) = var("AVATAR_TTS_BINARY") {
        config.tts.binary = PathBuf::from(binary);
    }
    if let Some(binary) = var("AVATAR_STT_BINARY") {
        config.stt.binary = PathBuf::from(binary);
    }
    if let Some(model) = var("AVATAR_STT_MODEL") {
        config.stt.model_path = PathBuf::from(model);
    }
    config
}
