mod common;

use axum::http::StatusCode;
use common::{b64, post_json, server, unb64, wav, FakeSynthesizer, Setup};
use serde_json::json;

#[tokio::test]
async fn transcribe_returns_recognized_text() {
    let srv = server(Setup::default(), |_| {});

    let reply = post_json(
        &srv.app,
        "/transcribe",
        json!({ "audio_base64": b64(&wav(16_000, 6_000)) }),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["text"], "What is your name?");
    assert_eq!(reply.json["success"], true);
}

#[tokio::test]
async fn transcribe_rejects_unusable_audio() {
    let srv = server(Setup::default(), |_| {});

    let silent = post_json(
        &srv.app,
        "/transcribe",
        json!({ "audio_base64": b64(&wav(16_000, 0)) }),
    )
    .await;
    assert_eq!(silent.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(silent.json["success"], false);

    let not_wav = post_json(
        &srv.app,
        "/transcribe",
        json!({ "audio_base64": b64(b"ID3\x03 definitely an mp3") }),
    )
    .await;
    assert_eq!(not_wav.status, StatusCode::UNPROCESSABLE_ENTITY);

    let unknown_format = post_json(
        &srv.app,
        "/transcribe",
        json!({ "audio_base64": b64(&wav(16_000, 6_000)), "audio_format": "ogg" }),
    )
    .await;
    assert_eq!(unknown_format.status, StatusCode::UNPROCESSABLE_ENTITY);

    let garbled = post_json(&srv.app, "/transcribe", json!({ "audio_base64": "@@@" })).await;
    assert_eq!(garbled.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn transcribe_reports_unreachable_recognizer() {
    let srv = server(
        Setup {
            heard: None,
            ..Setup::default()
        },
        |_| {},
    );

    let reply = post_json(
        &srv.app,
        "/transcribe",
        json!({ "audio_base64": b64(&wav(16_000, 6_000)) }),
    )
    .await;

    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.json["success"], false);
}

#[tokio::test]
async fn blank_transcript_is_unprocessable() {
    let srv = server(
        Setup {
            heard: Some("   "),
            ..Setup::default()
        },
        |_| {},
    );

    let reply = post_json(
        &srv.app,
        "/transcribe",
        json!({ "audio_base64": b64(&wav(16_000, 6_000)) }),
    )
    .await;

    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn tts_speaks_text_in_requested_voice() {
    let srv = server(Setup::default(), |_| {});

    let reply = post_json(
        &srv.app,
        "/tts",
        json!({ "text": "  Welcome to the store.  ", "voice_profile": "aria" }),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["audio_format"], "wav");
    assert_eq!(reply.json["success"], true);
    assert_eq!(
        unb64(reply.json["audio_base64"].as_str().unwrap()),
        b"Welcome to the store."
    );

    let requests = srv.synthesizer.requests.lock().unwrap();
    assert_eq!(requests[0].voice_profile.as_ref().unwrap().id, "aria");
}

#[tokio::test]
async fn tts_without_voice_uses_engine_default() {
    let srv = server(Setup::default(), |_| {});

    let reply = post_json(&srv.app, "/tts", json!({ "text": "Hello" })).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(srv.synthesizer.requests.lock().unwrap()[0]
        .voice_profile
        .is_none());
}

#[tokio::test]
async fn tts_requires_text() {
    let srv = server(Setup::default(), |_| {});

    let reply = post_json(&srv.app, "/tts", json!({ "text": " " })).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["success"], false);

    let missing = post_json(&srv.app, "/tts", json!({})).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tts_reports_synthesis_outage() {
    let srv = server(
        Setup {
            synthesizer: FakeSynthesizer {
                down: true,
                ..FakeSynthesizer::default()
            },
            ..Setup::default()
        },
        |_| {},
    );

    let reply = post_json(&srv.app, "/tts", json!({ "text": "Hello" })).await;

    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.json["success"], false);
}
