//! HTTP + WebSocket API for DRR sessions
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /session/new - Create and start a session
//! - GET /session/{id} - Latest snapshot and status
//! - POST /session/{id}/frame - Push a dB magnitude frame
//! - POST /session/{id}/command - Operator command ("force focus21", "reset", ...)
//! - POST /session/{id}/stop - Stop the session (log stays readable)
//! - GET /session/{id}/log - Session log
//! - DELETE /session/{id} - Stop and remove the session
//! - WS /ws/{id} - Snapshot stream; text frames are operator commands
//!
//! Stopped sessions are evicted by the control loop once they have been
//! stopped for `STOPPED_SESSION_TTL_MS`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::EngineConfig;
use crate::core::capture::{FrameCapture, FrameFeed};
use crate::core::engine::{DrrEngine, OperatorCommand};
use crate::core::render::SoftwareGraph;
use crate::types::{CaptureStatus, EngineSnapshot, FocusState, SessionRecord, TransitionEvent};
use crate::{DrrError, DrrResult};

/// How long a stopped session's log stays readable before eviction
pub const STOPPED_SESSION_TTL_MS: u64 = 10 * 60 * 1000;

/// One API session
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub engine: DrrEngine<SoftwareGraph>,
    pub feed: FrameFeed,
    pub update_tx: broadcast::Sender<EngineSnapshot>,
    /// Clock time the session was first seen stopped
    pub stopped_at_ms: Option<u64>,
}

impl Session {
    fn publish(&self, snapshot: &EngineSnapshot) {
        // no subscribers is fine
        let _ = self.update_tx.send(snapshot.clone());
    }

    fn note_stopped(&mut self, now_ms: u64) {
        if !self.engine.is_running() && self.stopped_at_ms.is_none() {
            self.stopped_at_ms = Some(now_ms);
        }
    }

    fn expired(&self, now_ms: u64) -> bool {
        self.stopped_at_ms
            .is_some_and(|at| now_ms.saturating_sub(at) >= STOPPED_SESSION_TTL_MS)
    }
}

/// App state
#[derive(Debug)]
pub struct AppState {
    pub sessions: RwLock<HashMap<String, Session>>,
    pub config: EngineConfig,
    pub clock: Arc<dyn Clock>,
    next_id: AtomicU64,
}

impl AppState {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            clock,
            next_id: AtomicU64::new(1),
        })
    }

    fn session_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("drr_{:x}_{}", chrono::Utc::now().timestamp_millis(), n)
    }
}

/// Create new session request
#[derive(Debug, Default, Deserialize)]
pub struct NewSessionRequest {
    /// Sample rate the pushed frames were computed at
    pub sample_rate: Option<f32>,
    /// Start with capture toggled off
    #[serde(default)]
    pub capture_disabled: bool,
}

/// Create new session response
#[derive(Debug, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
    pub capture: CaptureStatus,
}

/// Session status response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub running: bool,
    pub transitions: usize,
    pub snapshot: EngineSnapshot,
}

/// dB frame push
#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    pub magnitudes_db: Vec<f32>,
}

/// Frame push result; `committed` is false when the tick guard dropped it
#[derive(Debug, Serialize, Deserialize)]
pub struct FrameResponse {
    pub committed: bool,
    pub snapshot: EngineSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub focus_state: FocusState,
    pub running: bool,
    pub transition: Option<TransitionEvent>,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
}

fn status_for(err: &DrrError) -> StatusCode {
    match err {
        DrrError::Session(_) => StatusCode::CONFLICT,
        DrrError::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/session/:id/frame", post(push_frame))
        .route("/session/:id/command", post(run_command))
        .route("/session/:id/stop", post(stop_session))
        .route("/session/:id/log", get(get_log))
        .route("/ws/:id", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: sessions.values().filter(|s| s.engine.is_running()).count(),
    })
}

/// Create and start a session fed by pushed frames
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> Result<Json<NewSessionResponse>, StatusCode> {
    let sample_rate = req.sample_rate.unwrap_or(crate::DEFAULT_SAMPLE_RATE);
    if !(sample_rate > 0.0) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut engine = DrrEngine::new(
        state.config.clone(),
        Arc::clone(&state.clock),
        SoftwareGraph::new(sample_rate as f64),
    )
    .map_err(|e| status_for(&e))?;

    let (capture, feed) = FrameCapture::new(sample_rate, &state.config.analyser);
    engine.start(Ok(Box::new(capture))).map_err(|e| status_for(&e))?;
    if req.capture_disabled {
        engine
            .apply_command(OperatorCommand::SetCapture(false))
            .map_err(|e| status_for(&e))?;
    }

    let session_id = state.session_id();
    let capture = engine.capture_status();
    let (tx, _) = broadcast::channel(100);
    let session = Session {
        id: session_id.clone(),
        engine,
        feed,
        update_tx: tx,
        stopped_at_ms: None,
    };

    state.sessions.write().await.insert(session_id.clone(), session);
    info!(session = %session_id, "session created");

    Ok(Json(NewSessionResponse {
        websocket_url: format!("/ws/{}", session_id),
        session_id,
        capture,
    }))
}

/// Get session status
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, StatusCode> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(SessionStatusResponse {
        session_id: id,
        running: session.engine.is_running(),
        transitions: session.engine.transitions().len(),
        snapshot: session.engine.snapshot().clone(),
    }))
}

/// Push a frame and poll the engine once
async fn push_frame(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<FrameRequest>,
) -> Result<Json<FrameResponse>, StatusCode> {
    if req.magnitudes_db.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if !session.engine.is_running() {
        return Err(StatusCode::CONFLICT);
    }
    if !session.feed.push(req.magnitudes_db) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let committed = session.engine.poll();
    if let Some(snapshot) = &committed {
        session.publish(snapshot);
    }

    Ok(Json(FrameResponse {
        committed: committed.is_some(),
        snapshot: session.engine.snapshot().clone(),
    }))
}

/// Apply an operator command
async fn run_command(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, StatusCode> {
    let command: OperatorCommand = req.command.parse().map_err(|_| StatusCode::BAD_REQUEST)?;

    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    let transition = apply(session, command).map_err(|e| status_for(&e))?;
    session.note_stopped(state.clock.now_ms());

    Ok(Json(CommandResponse {
        focus_state: session.engine.focus_state(),
        running: session.engine.is_running(),
        transition,
    }))
}

fn apply(session: &mut Session, command: OperatorCommand) -> DrrResult<Option<TransitionEvent>> {
    let transition = session.engine.apply_command(command)?;
    info!(session = %session.id, ?command, "operator command");
    session.publish(session.engine.snapshot());
    Ok(transition)
}

/// Stop a session; its log stays readable
async fn stop_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, StatusCode> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    session.engine.stop();
    session.note_stopped(state.clock.now_ms());

    Ok(Json(SessionStatusResponse {
        session_id: id,
        running: false,
        transitions: session.engine.transitions().len(),
        snapshot: session.engine.snapshot().clone(),
    }))
}

/// Stop and remove a session; its websocket streams close
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let session = state
        .sessions
        .write()
        .await
        .remove(&id)
        .ok_or(StatusCode::NOT_FOUND)?;
    // dropping the engine runs its teardown
    drop(session);
    info!(session = %id, "session removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Get the session log
async fn get_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SessionRecord>>, StatusCode> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(session.engine.session_log().to_vec()))
}

/// WebSocket handler for live snapshots
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let rx = session.update_tx.subscribe();
    drop(sessions);

    Ok(ws.on_upgrade(move |socket| handle_websocket(socket, state, id, rx)))
}

/// Forward snapshots out; read operator commands in
async fn handle_websocket(
    socket: WebSocket,
    state: Arc<AppState>,
    id: String,
    mut rx: broadcast::Receiver<EngineSnapshot>,
) {
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(snapshot) => {
                    let Ok(json) = serde_json::to_string(&snapshot) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                // slow client: skip ahead to the newest snapshot
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let command = match text.parse::<OperatorCommand>() {
                Ok(command) => command,
                Err(e) => {
                    warn!(session = %id, error = %e, "ignoring websocket command");
                    continue;
                }
            };
            let mut sessions = state.sessions.write().await;
            if let Some(session) = sessions.get_mut(&id) {
                if let Err(e) = apply(session, command) {
                    warn!(session = %id, error = %e, "websocket command failed");
                }
                session.note_stopped(state.clock.now_ms());
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

/// Poll every running session once and evict expired stopped ones;
/// returns the number of committed ticks
pub async fn tick_sessions(state: &AppState) -> usize {
    let now = state.clock.now_ms();
    let mut sessions = state.sessions.write().await;
    let mut committed = 0;
    for session in sessions.values_mut() {
        if !session.engine.is_running() {
            session.note_stopped(now);
            continue;
        }
        if let Some(snapshot) = session.engine.poll() {
            session.publish(&snapshot);
            committed += 1;
        }
    }

    let before = sessions.len();
    sessions.retain(|_, session| !session.expired(now));
    let evicted = before - sessions.len();
    if evicted > 0 {
        info!(evicted, remaining = sessions.len(), "stopped sessions evicted");
    }
    committed
}

/// Run the API server with a background control loop
pub async fn run_server(addr: &str, config: EngineConfig) -> DrrResult<()> {
    let interval = Duration::from_millis(config.tick_interval_ms);
    let state = AppState::new(config, Arc::new(MonotonicClock::new()));

    let ticker_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            tick_sessions(&ticker_state).await;
        }
    });

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "DRR API listening");
    println!("◐ DRR API running on {}", addr);
    println!("  POST /session/new          - Create session");
    println!("  GET  /session/:id          - Get status");
    println!("  POST /session/:id/frame    - Push dB frame");
    println!("  POST /session/:id/command  - Operator command");
    println!("  POST /session/:id/stop     - Stop session");
    println!("  GET  /session/:id/log      - Session log");
    println!("  DEL  /session/:id          - Remove session");
    println!("  WS   /ws/:id               - Live snapshots");
    println!("  GET  /health               - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
