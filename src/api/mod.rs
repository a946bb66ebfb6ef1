//! REST control surface for tabrec.
//!
//! Provides HTTP endpoints for:
//! - Session state (GET /state)
//! - Recording control (POST /start, POST /stop)
//! - Upload (POST /send)
//! - Recording export (GET /recording)
//! - Settings (POST /settings)
//! - Push notices (GET /events, server-sent events)
//!
//! The surface holds no session state of its own: every reply is computed
//! from a fresh coordinator query, and notice consumers are expected to
//! re-query `/state` rather than rely on notice ordering.

pub mod routes;

use crate::proto::Notice;
use crate::session::SessionCoordinator;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tracing::info;

pub struct ApiServer {
    port: u16,
    coordinator: Arc<SessionCoordinator>,
    notices: broadcast::Sender<Notice>,
}

impl ApiServer {
    pub fn new(
        coordinator: Arc<SessionCoordinator>,
        notices: broadcast::Sender<Notice>,
        port: u16,
    ) -> Self {
        Self {
            port,
            coordinator,
            notices,
        }
    }

    /// The full router, split out so tests can drive it on an ephemeral port.
    pub fn router(
        coordinator: Arc<SessionCoordinator>,
        notices: broadcast::Sender<Notice>,
    ) -> Router {
        Router::new()
            .route("/", get(service_info))
            .route("/version", get(version))
            .merge(routes::session::router(routes::session::SessionApiState {
                coordinator,
            }))
            .merge(routes::events::router(notices))
            .layer(ServiceBuilder::new())
    }

    pub async fn start(self) -> Result<()> {
        let app = Self::router(self.coordinator, self.notices);

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /           - Service info");
        info!("  GET  /version    - Version info");
        info!("  GET  /state      - Session state");
        info!("  POST /start      - Start recording");
        info!("  POST /stop       - Stop recording");
        info!("  POST /send       - Upload the captured recording");
        info!("  GET  /recording  - Export the captured recording");
        info!("  POST /settings   - Save delivery settings");
        info!("  GET  /events     - Push notices (SSE)");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "tabrec",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "tabrec"
    }))
}
