//! Shared fakes and wiring for the integration tests.
#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use tabrec::config::{MemorySettingsStore, Settings};
use tabrec::platform::{CaptureBackend, CaptureHandle, CaptureStream, TabId, TabPlatform};
use tabrec::proto::Notice;
use tabrec::session::SessionCoordinator;
use tabrec::upload::Uploader;

pub struct ScriptedTabs {
    pub tab: Option<String>,
    pub deny_capture: bool,
}

impl Default for ScriptedTabs {
    fn default() -> Self {
        Self {
            tab: Some("tab-1".to_string()),
            deny_capture: false,
        }
    }
}

#[async_trait]
impl TabPlatform for ScriptedTabs {
    async fn active_tab(&self) -> Result<Option<TabId>> {
        Ok(self.tab.clone().map(TabId))
    }

    async fn capture_handle(&self, tab: &TabId) -> Result<CaptureHandle> {
        if self.deny_capture {
            bail!("capture permission denied");
        }
        Ok(CaptureHandle(tab.0.clone()))
    }
}

/// Backend whose streams deliver the scripted chunks at finalize time,
/// mirroring a recorder that flushes on stop.
pub struct ScriptedBackend {
    pub deny_acquire: bool,
    pub final_chunks: Vec<Vec<u8>>,
    pub acquired: AtomicUsize,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            deny_acquire: false,
            final_chunks: vec![b"scripted-bytes".to_vec()],
            acquired: AtomicUsize::new(0),
        }
    }
}

impl ScriptedBackend {
    pub fn acquire_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureBackend for ScriptedBackend {
    async fn acquire(&self, _handle: &CaptureHandle) -> Result<Box<dyn CaptureStream>> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if self.deny_acquire {
            bail!("stream acquisition denied");
        }
        Ok(Box::new(ScriptedStream {
            final_chunks: self.final_chunks.clone(),
            sink: None,
        }))
    }

    fn supports_mime(&self, mime: &str) -> bool {
        mime == "audio/webm"
    }

    fn default_mime(&self) -> &str {
        "audio/webm"
    }
}

struct ScriptedStream {
    final_chunks: Vec<Vec<u8>>,
    sink: Option<mpsc::Sender<Vec<u8>>>,
}

#[async_trait]
impl CaptureStream for ScriptedStream {
    fn attach_monitor(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_recorder(&mut self, _mime: &str, sink: mpsc::Sender<Vec<u8>>) -> Result<()> {
        self.sink = Some(sink);
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        let sink = match self.sink.take() {
            Some(sink) => sink,
            None => bail!("recorder not running"),
        };
        for chunk in self.final_chunks.drain(..) {
            let _ = sink.send(chunk).await;
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.sink = None;
    }
}

pub struct Harness {
    pub coordinator: Arc<SessionCoordinator>,
    pub notices_tx: broadcast::Sender<Notice>,
    pub backend: Arc<ScriptedBackend>,
    pub store: Arc<MemorySettingsStore>,
}

pub fn harness(tabs: ScriptedTabs, backend: ScriptedBackend, settings: Settings) -> Harness {
    let store = Arc::new(MemorySettingsStore::new(settings));
    let backend = Arc::new(backend);
    let (notices_tx, _) = broadcast::channel(16);

    let (coordinator, events_rx) = SessionCoordinator::new(
        Arc::new(tabs),
        Arc::clone(&backend) as Arc<dyn CaptureBackend>,
        Arc::clone(&store) as Arc<dyn tabrec::config::SettingsStore>,
        Uploader::new(),
        notices_tx.clone(),
        vec!["audio/webm".to_string()],
    );
    tokio::spawn(Arc::clone(&coordinator).run_events(events_rx));

    Harness {
        coordinator,
        notices_tx,
        backend,
        store,
    }
}

pub async fn wait_for_notice(rx: &mut broadcast::Receiver<Notice>) -> Notice {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for notice")
        .expect("notice channel closed")
}
