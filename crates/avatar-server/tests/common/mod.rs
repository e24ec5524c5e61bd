#![allow(dead_code)]

use async_trait::async_trait;
use avatar_knowledge::KnowledgeBase;
use avatar_pipeline::{Backends, FallbackError, LanguageModel};
use avatar_server::{app, config::Config, AppState};
use avatar_types::{AudioFormat, SynthesisRequest, VoiceProfile};
use avatar_voice::{
    RecognitionEngine, SpeechTranscriber, SttConfig, SynthesizedAudio, Synthesizer, VoiceError,
};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use base64::Engine;
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const QA_JSON: &str = r#"{
    "version": "2024-06",
    "entries": [
        {"id": 1, "question": "What is your name?", "answer": "I am Aria.", "tags": ["intro"]},
        {"id": 2, "question": "Where is the store located?", "answer": "We are on Main Street."},
        {"keywords": ["opening hours", "when are you open"], "answer": "We open 10-18 daily."}
    ]
}"#;

pub fn wav(samples: usize, amplitude: i16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buf = Vec::new();
    {
        let mut writer = hound::WavWriter::new(std::io::Cursor::new(&mut buf), spec).unwrap();
        for i in 0..samples {
            writer
                .write_sample(if i % 2 == 0 { amplitude } else { -amplitude })
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    buf
}

pub fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn unb64(encoded: &str) -> Vec<u8> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap()
}

/// Recognizer that always hears the same words, or is down.
pub struct FakeRecognizer {
    pub heard: Option<&'static str>,
}

#[async_trait]
impl RecognitionEngine for FakeRecognizer {
    async fn recognize(&self, _wav: &[u8]) -> Result<String, VoiceError> {
        self.heard
            .map(str::to_string)
            .ok_or_else(|| VoiceError::Transcription("recognizer unavailable".to_string()))
    }
}

/// Synthesizer that echoes the text as "audio". References must exist on
/// disk, like a real cloning backend.
#[derive(Default)]
pub struct FakeSynthesizer {
    pub down: bool,
    pub requests: Mutex<Vec<SynthesisRequest>>,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio, VoiceError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.down {
            return Err(VoiceError::Synthesis("speech backend offline".to_string()));
        }
        if let Some(profile) = &request.voice_profile {
            if !profile.reference_audio_path.exists() {
                return Err(VoiceError::VoiceProfile(format!(
                    "missing reference for {}",
                    profile.id
                )));
            }
        }
        Ok(SynthesizedAudio {
            bytes: request.text.as_bytes().to_vec(),
            format: AudioFormat::Wav,
        })
    }
}

pub struct FakeModel {
    pub reply: Option<&'static str>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl FakeModel {
    pub fn replying(reply: &'static str) -> Self {
        Self {
            reply: Some(reply),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn down() -> Self {
        Self {
            reply: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate(&self, _prompt: &str) -> Result<String, FallbackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.reply
            .map(str::to_string)
            .ok_or_else(|| FallbackError::Service("connection refused".to_string()))
    }
}

pub struct TestServer {
    pub app: Router,
    pub dir: TempDir,
    pub knowledge_path: PathBuf,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub model: Arc<FakeModel>,
}

pub struct Setup {
    pub heard: Option<&'static str>,
    pub synthesizer: FakeSynthesizer,
    pub model: FakeModel,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            heard: Some("What is your name?"),
            synthesizer: FakeSynthesizer::default(),
            model: FakeModel::replying("It should be sunny all day."),
        }
    }
}

/// Builds the router over fake backends. Voices: `aria` (valid reference)
/// and `broken` (reference file missing).
pub fn server(setup: Setup, tweak: impl FnOnce(&mut Config)) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let knowledge_path = dir.path().join("qa_data.json");
    std::fs::write(&knowledge_path, QA_JSON).unwrap();
    let aria = dir.path().join("aria.wav");
    std::fs::write(&aria, wav(1_600, 8_000)).unwrap();

    let mut config = Config::default();
    config.knowledge.path = knowledge_path.clone();
    config.voices = vec![
        VoiceProfile::new("aria", &aria),
        VoiceProfile::new("broken", dir.path().join("missing.wav")),
    ];
    config.fallback.timeout_ms = 200;
    config.responses.request_timeout_ms = 2_000;
    tweak(&mut config);

    let knowledge = avatar_knowledge::load(&config.knowledge.path)
        .unwrap_or_else(|_| KnowledgeBase::empty());
    let synthesizer = Arc::new(setup.synthesizer);
    let model = Arc::new(setup.model);
    let transcriber = Arc::new(SpeechTranscriber::new(
        Arc::new(FakeRecognizer { heard: setup.heard }),
        &SttConfig::default(),
    ));

    let state = AppState::from_config(
        &config,
        knowledge,
        Backends {
            transcriber,
            synthesizer: synthesizer.clone(),
            language_model: model.clone(),
        },
    );

    TestServer {
        app: app(state),
        dir,
        knowledge_path,
        synthesizer,
        model,
    }
}

pub fn local_client() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 12345)
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

pub async fn send_from(
    app: &Router,
    client: Option<SocketAddr>,
    method: Method,
    uri: &str,
    body: Option<String>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let mut request = builder
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .unwrap();
    if let Some(addr) = client {
        // Inject ConnectInfo manually as if extracted from connection
        request.extensions_mut().insert(ConnectInfo(addr));
    }

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Reply {
        status,
        headers,
        json,
    }
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Reply {
    send_from(app, Some(local_client()), Method::POST, uri, Some(body.to_string())).await
}

pub async fn get(app: &Router, uri: &str) -> Reply {
    send_from(app, Some(local_client()), Method::GET, uri, None).await
}
