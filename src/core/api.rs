//! HTTP + WebSocket API for FallSentry
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /state - Current fall state and counters
//! - POST /samples - Feed accelerometer readings
//! - POST /location - Push a location fix
//! - POST /cancel, POST /cancel/voice - Cancel the pending alert
//! - GET|PUT /config - Detection configuration
//! - GET /contacts, PUT|DELETE /contacts/{slot} - Emergency contacts
//! - POST /alerts/manual, POST /alerts/test, GET /alerts/last - Alerts
//! - POST /monitoring - Pause / resume
//! - WS /ws - Live notices and state changes

use axum::{
    extract::{ws::{Message, WebSocket}, Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::core::contacts::{ContactBook, ContactStore};
use crate::core::detector::DetectorStats;
use crate::core::monitor::FallMonitor;
use crate::core::narrator::BroadcastNarrator;
use crate::error::{MonitorError, StoreError};
use crate::types::{
    AccelReading, AlertReport, ConfigUpdate, Contact, DetectionConfig, FallState, Location,
    Notice, StateOutput,
};

/// App state
pub struct AppState {
    pub monitor: FallMonitor,
    pub contacts: Arc<ContactBook>,
    /// Source of live notices for WebSocket clients
    pub narrator: BroadcastNarrator,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub state: String,
}

/// State response
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: FallState,
    pub monitoring: bool,
    pub stats: DetectorStats,
}

/// Sample batch request
#[derive(Debug, Deserialize)]
pub struct SamplesRequest {
    pub samples: Vec<AccelReading>,
}

/// Sample batch response
#[derive(Debug, Serialize)]
pub struct SamplesResponse {
    pub outputs: Vec<StateOutput>,
    pub dropped: Vec<DroppedSample>,
}

#[derive(Debug, Serialize)]
pub struct DroppedSample {
    pub t: u64,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

#[derive(Debug, Deserialize)]
pub struct VoiceCancelRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct MonitoringRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct MonitoringResponse {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub accepted: bool,
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl ToString) -> Response {
    (status, Json(ErrorResponse { error: message.to_string() })).into_response()
}

/// Live update pushed over the WebSocket
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveUpdate {
    Notice { notice: Notice, text: String },
    State { state: FallState },
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(get_state))
        .route("/samples", post(post_samples))
        .route("/location", post(post_location))
        .route("/cancel", post(cancel))
        .route("/cancel/voice", post(cancel_voice))
        .route("/config", get(get_config).put(put_config))
        .route("/contacts", get(get_contacts))
        .route("/contacts/:slot", put(put_contact).delete(delete_contact))
        .route("/alerts/manual", post(manual_alert))
        .route("/alerts/test", post(test_alert))
        .route("/alerts/last", get(last_alert))
        .route("/monitoring", post(set_monitoring))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

/// Router plus the background task that expires free-falls when pushed
/// samples stop arriving. Must run inside a tokio runtime.
pub fn create_app(state: Arc<AppState>) -> Router {
    state.monitor.spawn_stall_watch();
    create_router(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        state: state.monitor.state().name().to_string(),
    })
}

async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(StateResponse {
        state: state.monitor.state(),
        monitoring: state.monitor.is_enabled(),
        stats: state.monitor.stats(),
    })
}

/// Feed readings in order. Anomalous samples are reported, never fatal.
async fn post_samples(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SamplesRequest>,
) -> Json<SamplesResponse> {
    let mut outputs = Vec::with_capacity(req.samples.len());
    let mut dropped = Vec::new();

    for reading in req.samples {
        match state.monitor.submit(reading.to_sample()) {
            Ok(output) => outputs.push(output),
            Err(err) => dropped.push(DroppedSample {
                t: reading.timestamp_ms,
                reason: err.to_string(),
            }),
        }
    }

    Json(SamplesResponse { outputs, dropped })
}

async fn post_location(
    State(state): State<Arc<AppState>>,
    Json(location): Json<Location>,
) -> Response {
    if state.monitor.update_location(location) {
        Json(LocationResponse { accepted: true }).into_response()
    } else {
        error(StatusCode::UNPROCESSABLE_ENTITY, "coordinates out of range")
    }
}

async fn cancel(State(state): State<Arc<AppState>>) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.monitor.cancel(),
    })
}

async fn cancel_voice(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VoiceCancelRequest>,
) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.monitor.cancel_by_voice(&req.text),
    })
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<DetectionConfig> {
    Json(state.monitor.config().get())
}

/// Partial update; the previous config stays when validation fails
async fn put_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ConfigUpdate>,
) -> Response {
    match state.monitor.config().set(&update) {
        Ok(config) => Json(config).into_response(),
        Err(err) => error(StatusCode::UNPROCESSABLE_ENTITY, err),
    }
}

async fn get_contacts(State(state): State<Arc<AppState>>) -> Json<Vec<Option<Contact>>> {
    Json(state.contacts.snapshot().slots().to_vec())
}

fn store_error(err: StoreError) -> Response {
    match err {
        StoreError::NoSuchSlot(_) => error(StatusCode::NOT_FOUND, err),
        StoreError::InvalidPhone(_) => error(StatusCode::UNPROCESSABLE_ENTITY, err),
        other => {
            warn!(%other, "contact store failure");
            error(StatusCode::INTERNAL_SERVER_ERROR, other)
        }
    }
}

async fn put_contact(
    State(state): State<Arc<AppState>>,
    Path(slot): Path<usize>,
    Json(contact): Json<Contact>,
) -> Response {
    match state.contacts.set_slot(slot, contact) {
        Ok(()) => get_contacts(State(state)).await.into_response(),
        Err(err) => store_error(err),
    }
}

async fn delete_contact(State(state): State<Arc<AppState>>, Path(slot): Path<usize>) -> Response {
    match state.contacts.clear_slot(slot) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error(err),
    }
}

/// Send a manual emergency alert and wait for the outcomes
async fn manual_alert(State(state): State<Arc<AppState>>) -> Response {
    let handle = match state.monitor.trigger_manual() {
        Ok(handle) => handle,
        Err(err @ MonitorError::CycleActive) => return error(StatusCode::CONFLICT, err),
        Err(err) => return error(StatusCode::SERVICE_UNAVAILABLE, err),
    };
    match handle.await {
        Ok(report) => Json(report).into_response(),
        Err(err) => error(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

async fn test_alert(State(state): State<Arc<AppState>>) -> Json<AlertReport> {
    Json(state.monitor.send_test_alert().await)
}

async fn last_alert(State(state): State<Arc<AppState>>) -> Result<Json<AlertReport>, StatusCode> {
    state.monitor.last_report().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn set_monitoring(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MonitoringRequest>,
) -> Json<MonitoringResponse> {
    if req.enabled {
        state.monitor.resume();
    } else {
        state.monitor.pause();
    }
    Json(MonitoringResponse {
        enabled: state.monitor.is_enabled(),
    })
}

/// WebSocket handler for live updates
async fn websocket_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let notices = state.narrator.subscribe();
    let states = state.monitor.watch_state();
    ws.on_upgrade(move |socket| handle_websocket(socket, notices, states))
}

/// Handle WebSocket connection
async fn handle_websocket(
    mut socket: WebSocket,
    mut notices: broadcast::Receiver<Notice>,
    mut states: watch::Receiver<FallState>,
) {
    loop {
        let update = tokio::select! {
            notice = notices.recv() => match notice {
                Ok(notice) => LiveUpdate::Notice { text: notice.text(), notice },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = states.changed() => match changed {
                Ok(()) => {
                    let state = *states.borrow_and_update();
                    LiveUpdate::State { state }
                }
                Err(_) => break,
            },
        };
        let json = match serde_json::to_string(&update) {
            Ok(json) => json,
            Err(err) => {
                warn!(%err, "live update not serialisable, skipped");
                continue;
            }
        };
        if socket.send(Message::Text(json)).await.is_err() {
            break;
        }
    }
}

/// Run the API server
pub async fn run_server(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "api listening");
    println!("🛡  FallSentry API running on {}", addr);
    println!("  GET  /health             - Health check");
    println!("  GET  /state              - Fall state + counters");
    println!("  POST /samples            - Feed accelerometer readings");
    println!("  POST /location           - Push location fix");
    println!("  POST /cancel             - Cancel pending alert");
    println!("  POST /cancel/voice       - Cancel by phrase");
    println!("  GET  /config, PUT /config");
    println!("  GET  /contacts, PUT|DELETE /contacts/:slot");
    println!("  POST /alerts/manual      - Manual emergency");
    println!("  POST /alerts/test        - Test alert");
    println!("  GET  /alerts/last        - Last alert outcomes");
    println!("  POST /monitoring         - Pause / resume");
    println!("  WS   /ws                 - Live updates");
    axum::serve(listener, router).await?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
