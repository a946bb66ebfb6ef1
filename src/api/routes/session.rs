//! Session command and query endpoints.
//!
//! Every command reply is `{ok, message?}`; failures are rendered into the
//! reply rather than an HTTP error status, so a client can always read one
//! shape.

use crate::config::{SendMode, Settings};
use crate::session::{SessionCoordinator, SessionError, StateSnapshot};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct SessionApiState {
    pub coordinator: Arc<SessionCoordinator>,
}

pub fn router(state: SessionApiState) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/send", post(send))
        .route("/recording", get(get_recording))
        .route("/settings", post(save_settings))
        .with_state(state)
}

fn reply(result: Result<(), SessionError>) -> Json<Value> {
    match result {
        Ok(()) => Json(json!({ "ok": true })),
        Err(e) => Json(json!({ "ok": false, "message": e.to_string() })),
    }
}

async fn get_state(State(state): State<SessionApiState>) -> Json<StateSnapshot> {
    Json(state.coordinator.get_state().await)
}

async fn start(State(state): State<SessionApiState>) -> Json<Value> {
    info!("Start command received via API");
    reply(state.coordinator.start().await)
}

async fn stop(State(state): State<SessionApiState>) -> Json<Value> {
    info!("Stop command received via API");
    reply(state.coordinator.stop().await)
}

async fn send(State(state): State<SessionApiState>) -> Json<Value> {
    info!("Send command received via API");
    reply(state.coordinator.send().await)
}

async fn get_recording(State(state): State<SessionApiState>) -> Json<Value> {
    match state.coordinator.get_recording().await {
        Ok(recording) => Json(json!({
            "ok": true,
            "bytes": BASE64.encode(&recording.bytes),
            "mimeType": recording.mime_type,
            "durationMs": recording.duration_ms,
        })),
        Err(e) => Json(json!({ "ok": false, "message": e.to_string() })),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSettingsRequest {
    pub api_url: String,
    #[serde(default)]
    pub send_mode: SendMode,
}

async fn save_settings(
    State(state): State<SessionApiState>,
    Json(request): Json<SaveSettingsRequest>,
) -> Json<Value> {
    let settings = Settings {
        api_url: request.api_url.trim().to_string(),
        send_mode: request.send_mode,
    };
    reply(state.coordinator.save_settings(settings).await)
}
