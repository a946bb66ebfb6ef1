//! Service wiring.

use crate::api::ApiServer;
use crate::config::{Config, TomlSettingsStore};
use crate::global;
use crate::platform::{CaptureBackend, MonitorBackend, MonitorPlatform, TabPlatform};
use crate::session::SessionCoordinator;
use crate::upload::Uploader;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

const NOTICE_CHANNEL_CAPACITY: usize = 32;

pub async fn run_service() -> Result<()> {
    info!("Starting tabrec service");

    let config = Config::load()?;

    let store = Arc::new(TomlSettingsStore::new(global::settings_file()?));
    let tabs: Arc<dyn TabPlatform> = Arc::new(MonitorPlatform::new());
    let backend: Arc<dyn CaptureBackend> = Arc::new(MonitorBackend::new());
    let (notices_tx, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);

    let (coordinator, events_rx) = SessionCoordinator::new(
        tabs,
        backend,
        store,
        Uploader::new(),
        notices_tx.clone(),
        config.capture.preferred_mime_types.clone(),
    );

    tokio::spawn(Arc::clone(&coordinator).run_events(events_rx));

    info!("tabrec is ready!");
    info!(
        "Control it with: curl -X POST http://127.0.0.1:{}/start",
        config.server.port
    );

    ApiServer::new(coordinator, notices_tx, config.server.port)
        .start()
        .await
}
