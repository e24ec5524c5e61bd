//! API handlers for the avatar server.

use crate::AppState;
use avatar_pipeline::UserInput;
use avatar_types::{AudioFormat, ResponseSource, SynthesisRequest};
use avatar_voice::VoiceError;
use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message,
            "success": false
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<VoiceError> for ApiError {
    fn from(e: VoiceError) -> Self {
        if e.is_bad_input() {
            ApiError::Unprocessable(e.to_string())
        } else {
            ApiError::ServiceUnavailable(e.to_string())
        }
    }
}

/// Decodes standard base64, accepting an optional `data:<mime>;base64,`
/// prefix as produced by browser recorders.
fn decode_audio(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let trimmed = encoded.trim();
    let payload = match trimmed.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => trimmed,
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ApiError::BadRequest(format!("audio_base64 is not valid base64: {}", e)))
}

fn encode_audio(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Size of the encoded audio in KiB, rounded to one decimal.
fn size_kb(encoded: &str) -> f64 {
    (encoded.len() as f64 / 1024.0 * 10.0).round() / 10.0
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Request body for `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub audio_base64: Option<String>,
    /// Container of `audio_base64`; defaults to wav.
    #[serde(default)]
    pub audio_format: Option<String>,
    /// Voice profile id to answer in.
    #[serde(default)]
    pub voice_profile: Option<String>,
}

/// Response body for `POST /chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub source: ResponseSource,
    pub audio_base64: Option<String>,
    pub audio_format: AudioFormat,
    pub audio_size_kb: Option<f64>,
    pub confidence: f32,
    pub request_id: String,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub audio_base64: String,
    #[serde(default)]
    pub audio_format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub text: String,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default)]
    pub voice_profile: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TtsResponse {
    pub audio_base64: String,
    pub audio_format: AudioFormat,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct QaSearchRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QaSearchResponse {
    pub response: String,
    pub matched: bool,
    pub score: f32,
    pub entry_id: Option<u64>,
    pub success: bool,
}

/// Handler for `POST /chat`.
///
/// Exactly one of `text` and `audio_base64` must be present. Backend
/// failures never fail the request; they show up as a degraded `source` or
/// a null `audio_base64`.
pub async fn chat_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload?;

    let input = match (non_empty(payload.text), non_empty(payload.audio_base64)) {
        (Some(text), None) => UserInput::Text(text.trim().to_string()),
        (None, Some(encoded)) => {
            let format: AudioFormat = payload
                .audio_format
                .as_deref()
                .unwrap_or("wav")
                .parse()
                .map_err(|e| ApiError::BadRequest(format!("{}", e)))?;
            UserInput::Audio {
                bytes: decode_audio(&encoded)?,
                format,
            }
        }
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "send either text or audio_base64, not both".to_string(),
            ))
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "text or audio_base64 is required".to_string(),
            ))
        }
    };

    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("chat", request_id = %request_id);

    let voice = state.resolve_voice(payload.voice_profile.as_deref());
    let reply = state
        .orchestrator
        .respond(input, voice)
        .instrument(span)
        .await;

    let audio_base64 = reply.audio.as_deref().map(encode_audio);
    let audio_size_kb = audio_base64.as_deref().map(size_kb);

    Ok(Json(ChatResponse {
        response: reply.text,
        source: reply.source,
        audio_base64,
        audio_format: reply.audio_format,
        audio_size_kb,
        confidence: reply.confidence,
        request_id,
        success: true,
    }))
}

/// Handler for `POST /transcribe`.
pub async fn transcribe_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<TranscribeRequest>, JsonRejection>,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let Json(payload) = payload?;
    let bytes = decode_audio(&payload.audio_base64)?;
    let format: AudioFormat = payload
        .audio_format
        .as_deref()
        .unwrap_or("wav")
        .parse()
        .map_err(|e| ApiError::Unprocessable(format!("{}", e)))?;

    let text = state.orchestrator.transcribe(bytes, format).await?;
    Ok(Json(TranscribeResponse {
        text,
        success: true,
    }))
}

/// Handler for `POST /tts`.
pub async fn tts_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Json<TtsResponse>, ApiError> {
    let Json(payload) = payload?;
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("text is required".to_string()));
    }

    let voice = state.resolve_voice(payload.voice_profile.as_deref());
    let request = match voice {
        Some(profile) => SynthesisRequest::with_voice(text, profile),
        None => SynthesisRequest::default_voice(text),
    };
    let audio = state.orchestrator.synthesize(request).await?;

    Ok(Json(TtsResponse {
        audio_base64: encode_audio(&audio.bytes),
        audio_format: audio.format,
        success: true,
    }))
}

const NO_MATCH_TEXT: &str = "No matching answer found";

/// Handler for `POST /qa-search`. Matches against the knowledge base only.
pub async fn qa_search_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<QaSearchRequest>, JsonRejection>,
) -> Result<Json<QaSearchResponse>, ApiError> {
    let Json(payload) = payload?;
    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text is required".to_string()));
    }

    let lookup = state.orchestrator.lookup(&payload.text);
    tracing::debug!(
        matched = lookup.matched,
        score = lookup.score,
        "qa search"
    );
    Ok(Json(QaSearchResponse {
        response: lookup
            .answer
            .unwrap_or_else(|| NO_MATCH_TEXT.to_string()),
        matched: lookup.matched,
        score: lookup.score,
        entry_id: lookup.entry_id,
        success: true,
    }))
}

/// Handler for `POST /admin/reload-knowledge`.
///
/// The new file is parsed off to the side; on any error the index currently
/// serving requests stays in place.
pub async fn reload_knowledge_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let knowledge = state.orchestrator.knowledge().clone();
    let path = state.knowledge_path.clone();

    let loaded = tokio::task::spawn_blocking(move || knowledge.reload(&path))
        .await
        .map_err(|e| ApiError::Internal(format!("reload task failed: {}", e)))?;

    match loaded {
        Ok(count) => Ok(Json(json!({ "qa_loaded": count, "success": true }))),
        Err(e) => {
            tracing::warn!(error = %e, "knowledge base reload rejected");
            Err(ApiError::Unprocessable(e.to_string()))
        }
    }
}

/// Handler for `GET /health`.
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let kb = state.orchestrator.knowledge().snapshot();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "qa_loaded": kb.len(),
        "knowledge_version": kb.version(),
        "backends": state.backends,
    }))
}

/// Handler for `GET /`.
pub async fn index_handler() -> Json<Value> {
    Json(json!({
        "message": "AI avatar backend is running",
        "status": "ok",
        "endpoints": {
            "chat": "POST /chat",
            "transcribe": "POST /transcribe",
            "tts": "POST /tts",
            "qa_search": "POST /qa-search",
            "reload_knowledge": "POST /admin/reload-knowledge",
            "health": "GET /health"
        }
    }))
}
