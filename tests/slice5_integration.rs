//! Integration tests for Slice 5 - HTTP API
//!
//! Tests API endpoints against a shared state driven by a manual clock

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use drr::clock::ManualClock;
use drr::config::EngineConfig;
use drr::core::{create_router, tick_sessions, AppState, STOPPED_SESSION_TTL_MS};

fn test_app() -> (Router, Arc<AppState>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let state = AppState::new(EngineConfig::default(), clock.clone());
    (create_router(Arc::clone(&state)), state, clock)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn new_session(app: &Router) -> String {
    let (status, json) = send(app, "POST", "/session/new", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    json["session_id"].as_str().unwrap().to_string()
}

fn harmonic_frame() -> Vec<f32> {
    let mut frame = vec![-90.0f32; 4096];
    frame[8] = -20.0;
    frame[16] = -25.0;
    frame[24] = -30.0;
    frame
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _, _) = test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["sessions_active"], 0);
}

#[tokio::test]
async fn test_create_session() {
    let (app, _, _) = test_app();

    let (status, json) = send(&app, "POST", "/session/new", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let id = json["session_id"].as_str().unwrap();
    assert_eq!(json["websocket_url"], format!("/ws/{}", id));
    assert_eq!(json["capture"], "ACTIVE");

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["sessions_active"], 1);
}

#[tokio::test]
async fn test_create_session_with_capture_disabled() {
    let (app, _, _) = test_app();

    let (status, json) = send(&app, "POST", "/session/new", Some(json!({ "capture_disabled": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["capture"], "DISABLED");

    let (status, _) = send(&app, "POST", "/session/new", Some(json!({ "sample_rate": 0.0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_not_found() {
    let (app, _, _) = test_app();

    for (method, uri) in [
        ("GET", "/session/nonexistent"),
        ("GET", "/session/nonexistent/log"),
        ("POST", "/session/nonexistent/stop"),
    ] {
        let (status, _) = send(&app, method, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn test_frame_push_ticks_engine() {
    let (app, _, clock) = test_app();
    let id = new_session(&app).await;

    clock.advance(250);
    let (status, json) = send(
        &app,
        "POST",
        &format!("/session/{}/frame", id),
        Some(json!({ "magnitudes_db": harmonic_frame() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["committed"], true);
    assert_eq!(json["snapshot"]["tick"], 1);
    assert_eq!(json["snapshot"]["focus_state"], "FOCUS_12");
    assert_eq!(json["snapshot"]["resonance_nodes"].as_array().unwrap().len(), 3);

    // same instant: dropped by the tick guard
    let (_, json) = send(
        &app,
        "POST",
        &format!("/session/{}/frame", id),
        Some(json!({ "magnitudes_db": harmonic_frame() })),
    )
    .await;
    assert_eq!(json["committed"], false);
    assert_eq!(json["snapshot"]["tick"], 1);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/session/{}/frame", id),
        Some(json!({ "magnitudes_db": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_background_ticks_reach_focus_15() {
    let (app, state, clock) = test_app();
    let id = new_session(&app).await;

    clock.advance(250);
    send(
        &app,
        "POST",
        &format!("/session/{}/frame", id),
        Some(json!({ "magnitudes_db": harmonic_frame() })),
    )
    .await;

    for _ in 0..180 {
        clock.advance(250);
        assert_eq!(tick_sessions(&state).await, 1);
    }

    let (status, json) = send(&app, "GET", &format!("/session/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], true);
    assert_eq!(json["transitions"], 1);
    assert_eq!(json["snapshot"]["focus_state"], "FOCUS_15");
    assert_eq!(json["snapshot"]["time_collapse"]["active"], true);

    let (_, log) = send(&app, "GET", &format!("/session/{}/log", id), None).await;
    let log = log.as_array().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["kind"], "atemporal");
    assert_eq!(log[0]["no_time_markers"], true);
}

#[tokio::test]
async fn test_operator_command_endpoint() {
    let (app, _, _) = test_app();
    let id = new_session(&app).await;
    let uri = format!("/session/{}/command", id);

    let (status, json) = send(&app, "POST", &uri, Some(json!({ "command": "force CRL-T" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["focus_state"], "CRL_T");
    assert_eq!(json["transition"]["reason"], "R005_OPERATOR_OVERRIDE");

    // already there: no transition
    let (_, json) = send(&app, "POST", &uri, Some(json!({ "command": "force crlt" }))).await;
    assert!(json["transition"].is_null());

    let (status, _) = send(&app, "POST", &uri, Some(json!({ "command": "levitate" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = send(&app, "POST", &uri, Some(json!({ "command": "reset" }))).await;
    assert_eq!(json["focus_state"], "FOCUS_12");
    assert_eq!(json["transition"]["reason"], "R005_OPERATOR_RESET");
}

#[tokio::test]
async fn test_stop_keeps_log_readable() {
    let (app, _, _) = test_app();
    let id = new_session(&app).await;

    send(
        &app,
        "POST",
        &format!("/session/{}/command", id),
        Some(json!({ "command": "force focus21" })),
    )
    .await;

    let (status, json) = send(&app, "POST", &format!("/session/{}/stop", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], false);
    assert_eq!(json["snapshot"]["capture"], "IDLE");

    // stopping twice is harmless
    let (status, _) = send(&app, "POST", &format!("/session/{}/stop", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/session/{}/command", id),
        Some(json!({ "command": "reset" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/session/{}/frame", id),
        Some(json!({ "magnitudes_db": harmonic_frame() })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, log) = send(&app, "GET", &format!("/session/{}/log", id), None).await;
    assert_eq!(log.as_array().unwrap().len(), 1);
    assert_eq!(log[0]["kind"], "transition");
}

#[tokio::test]
async fn test_stopped_sessions_are_evicted() {
    let (app, state, clock) = test_app();

    for _ in 0..50 {
        let id = new_session(&app).await;
        let (status, _) = send(&app, "POST", &format!("/session/{}/stop", id), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let running = new_session(&app).await;
    assert_eq!(state.sessions.read().await.len(), 51);

    // logs stay readable inside the retention window
    clock.advance(STOPPED_SESSION_TTL_MS - 1);
    tick_sessions(&state).await;
    assert_eq!(state.sessions.read().await.len(), 51);

    clock.advance(1);
    tick_sessions(&state).await;
    let sessions = state.sessions.read().await;
    assert_eq!(sessions.len(), 1);
    assert!(sessions.contains_key(&running));
}

#[tokio::test]
async fn test_stop_command_starts_retention_clock() {
    let (app, state, clock) = test_app();
    let id = new_session(&app).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/session/{}/command", id),
        Some(json!({ "command": "stop" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], false);

    clock.advance(STOPPED_SESSION_TTL_MS);
    tick_sessions(&state).await;
    assert!(state.sessions.read().await.is_empty());

    let (status, _) = send(&app, "GET", &format!("/session/{}/log", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_session() {
    let (app, state, _) = test_app();
    let id = new_session(&app).await;
    let keep = new_session(&app).await;

    let (status, _) = send(&app, "DELETE", &format!("/session/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(state.sessions.read().await.len(), 1);

    let (status, _) = send(&app, "GET", &format!("/session/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &format!("/session/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["sessions_active"], 1);
    let (status, _) = send(&app, "GET", &format!("/session/{}", keep), None).await;
    assert_eq!(status, StatusCode::OK);
}
