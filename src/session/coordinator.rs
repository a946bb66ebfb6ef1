//! The session coordinator.
//!
//! Routes control-surface commands to the capture worker, consumes the
//! worker's terminal events, applies the send-mode policy and answers state
//! queries. Command handlers suspend at every platform call, so concurrent
//! invocations interleave — the explicit in-flight guard (not the phase
//! alone) is what rejects a second `start` racing inside the unresolved
//! async window.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{error, info, warn};

use super::error::SessionError;
use super::status::{CapturedRecording, SessionHandle, SessionPhase};
use crate::capture;
use crate::config::{SendMode, Settings, SettingsStore};
use crate::platform::{CaptureBackend, TabPlatform};
use crate::proto::{CaptureCommand, CaptureEvent, Notice};
use crate::upload::Uploader;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Reply to a `get-state` query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub is_recording: bool,
    pub has_recording: bool,
    pub api_url: String,
    pub send_mode: SendMode,
}

/// Releases the in-flight flag on every exit path, including `?`.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then_some(Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SessionCoordinator {
    session: SessionHandle,
    tabs: Arc<dyn TabPlatform>,
    backend: Arc<dyn CaptureBackend>,
    store: Arc<dyn SettingsStore>,
    uploader: Uploader,
    notices: broadcast::Sender<Notice>,
    events_tx: mpsc::Sender<CaptureEvent>,
    /// Lazily-spawned capture worker, kept for reuse across sessions.
    worker: Mutex<Option<mpsc::Sender<CaptureCommand>>>,
    /// Spans the whole async start sequence, not just the phase write.
    start_in_flight: AtomicBool,
    preferred_mimes: Vec<String>,
}

impl SessionCoordinator {
    pub fn new(
        tabs: Arc<dyn TabPlatform>,
        backend: Arc<dyn CaptureBackend>,
        store: Arc<dyn SettingsStore>,
        uploader: Uploader,
        notices: broadcast::Sender<Notice>,
        preferred_mimes: Vec<String>,
    ) -> (Arc<Self>, mpsc::Receiver<CaptureEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let coordinator = Arc::new(Self {
            session: SessionHandle::default(),
            tabs,
            backend,
            store,
            uploader,
            notices,
            events_tx,
            worker: Mutex::new(None),
            start_in_flight: AtomicBool::new(false),
            preferred_mimes,
        });
        (coordinator, events_rx)
    }

    /// Consume the capture worker's terminal events. Spawned once by the
    /// service wiring.
    pub async fn run_events(self: Arc<Self>, mut events: mpsc::Receiver<CaptureEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                CaptureEvent::Ready {
                    bytes,
                    mime_type,
                    duration_ms,
                } => self.on_recording_ready(bytes, mime_type, duration_ms).await,
                CaptureEvent::Failed { message } => self.on_capture_error(message).await,
            }
        }
    }

    /// Side-effect-free state query; settings are read through the store on
    /// every call, never cached.
    pub async fn get_state(&self) -> StateSnapshot {
        let settings = self.store.load().unwrap_or_else(|e| {
            warn!("Failed to load settings, reporting defaults: {e:#}");
            Settings::default()
        });

        StateSnapshot {
            is_recording: self.session.is_recording().await,
            has_recording: self.session.has_recording().await,
            api_url: settings.api_url,
            send_mode: settings.send_mode,
        }
    }

    pub async fn start(&self) -> Result<(), SessionError> {
        let _guard = InFlightGuard::claim(&self.start_in_flight)
            .ok_or(SessionError::AlreadyInProgress)?;

        if !self.session.begin_starting().await {
            return Err(SessionError::AlreadyInProgress);
        }

        let tab = match self.tabs.active_tab().await {
            Ok(Some(tab)) => tab,
            Ok(None) => return Err(self.fail_start(SessionError::NoActiveTab).await),
            Err(e) => {
                return Err(self
                    .fail_start(SessionError::CaptureUnavailable(format!("{e:#}")))
                    .await)
            }
        };

        let handle = match self.tabs.capture_handle(&tab).await {
            Ok(handle) => handle,
            Err(e) => {
                return Err(self
                    .fail_start(SessionError::CaptureUnavailable(format!("{e:#}")))
                    .await)
            }
        };

        let worker = self.ensure_worker().await;
        self.session.set_recording().await;

        if worker.send(CaptureCommand::Start { handle }).await.is_err() {
            return Err(self
                .fail_start(SessionError::RecorderFailure(
                    "capture worker unavailable".to_string(),
                ))
                .await);
        }

        info!("Recording started on tab {:?}", tab.0);
        Ok(())
    }

    /// Signals the worker to finalize. The phase stays `Recording` until the
    /// worker's terminal event arrives — final data can flush after the stop
    /// signal, and only the terminal event carries the result.
    pub async fn stop(&self) -> Result<(), SessionError> {
        if self.session.phase().await != SessionPhase::Recording {
            return Err(SessionError::NoActiveSession);
        }

        let worker = self
            .worker
            .lock()
            .await
            .clone()
            .ok_or(SessionError::NoActiveSession)?;

        worker
            .send(CaptureCommand::Stop)
            .await
            .map_err(|_| SessionError::RecorderFailure("capture worker unavailable".to_string()))?;

        info!("Stop requested, waiting for the recorder to finalize");
        Ok(())
    }

    /// Upload the captured recording. Never mutates the recording, so a
    /// failed upload can simply be retried.
    pub async fn send(&self) -> Result<(), SessionError> {
        let recording = self
            .session
            .captured()
            .await
            .ok_or(SessionError::NoRecording)?;

        let settings = self
            .store
            .load()
            .map_err(|e| SessionError::SettingsUnavailable(format!("{e:#}")))?;

        if settings.api_url.is_empty() {
            return Err(SessionError::ConfigMissing);
        }

        self.uploader.upload(&settings.api_url, &recording).await
    }

    pub async fn get_recording(&self) -> Result<CapturedRecording, SessionError> {
        self.session
            .captured()
            .await
            .ok_or(SessionError::NoRecording)
    }

    /// Pass-through write to the settings store; no state-machine effect.
    pub async fn save_settings(&self, settings: Settings) -> Result<(), SessionError> {
        self.store
            .save(&settings)
            .map_err(|e| SessionError::SettingsUnavailable(format!("{e:#}")))
    }

    async fn on_recording_ready(&self, bytes: Vec<u8>, mime_type: String, duration_ms: u64) {
        let size = bytes.len();
        let recording = CapturedRecording {
            bytes,
            mime_type,
            duration_ms,
        };

        if !self.session.complete(recording).await {
            warn!("Dropping recording-ready event outside a live session");
            return;
        }

        info!("Recording ready: {} bytes, {}ms", size, duration_ms);

        // Read fresh rather than pinned at start: a send-mode change during
        // the recording applies to the recording that just finished.
        let send_mode = match self.store.load() {
            Ok(settings) => settings.send_mode,
            Err(e) => {
                warn!("Failed to load settings, treating send mode as manual: {e:#}");
                SendMode::Manual
            }
        };

        match send_mode {
            SendMode::Auto => {
                if let Err(e) = self.send().await {
                    error!("Automatic upload failed: {e}");
                }
                // The control surface re-queries state either way.
                self.notify(Notice::UploadComplete);
            }
            SendMode::Manual => self.notify(Notice::RecordingReady),
        }
    }

    async fn on_capture_error(&self, message: String) {
        if !self.session.fail_capture(message.clone()).await {
            warn!("Dropping capture-error event outside a live session");
            return;
        }

        error!("Capture failed: {message}");
        self.notify(Notice::CaptureFailed { message });
    }

    async fn fail_start(&self, err: SessionError) -> SessionError {
        self.session.set_error(err.to_string()).await;
        err
    }

    /// The worker has no independent lifecycle: spawned on first use and
    /// re-spawned if its task has exited.
    async fn ensure_worker(&self) -> mpsc::Sender<CaptureCommand> {
        let mut slot = self.worker.lock().await;
        if let Some(tx) = slot.as_ref() {
            if !tx.is_closed() {
                return tx.clone();
            }
            info!("Capture worker is gone, spawning a fresh one");
        }

        let tx = capture::spawn(
            Arc::clone(&self.backend),
            self.preferred_mimes.clone(),
            self.events_tx.clone(),
        );
        *slot = Some(tx.clone());
        tx
    }

    fn notify(&self, notice: Notice) {
        // No subscriber is fine; the next state query catches them up.
        let _ = self.notices.send(notice);
    }
}
