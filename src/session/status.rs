//! Session state types and the shared state handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Phase of the recording session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Starting,
    Recording,
    Ready,
    Error,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Recording => "recording",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Live phases hold the single-session slot.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Starting | Self::Recording)
    }
}

/// A finished capture, present only while the session is `Ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecording {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub duration_ms: u64,
}

/// The one session record. Created `Idle` at service start, never destroyed —
/// only reset by the next `start`.
#[derive(Debug, Clone)]
pub struct Session {
    pub phase: SessionPhase,
    pub captured: Option<CapturedRecording>,
    pub last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            captured: None,
            last_error: None,
        }
    }
}

/// Handle to the session record. Only the coordinator mutates it; each
/// method is one atomic transition.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub async fn get(&self) -> Session {
        self.inner.lock().await.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.phase
    }

    pub async fn is_recording(&self) -> bool {
        self.inner.lock().await.phase.is_live()
    }

    pub async fn has_recording(&self) -> bool {
        self.inner.lock().await.captured.is_some()
    }

    pub async fn captured(&self) -> Option<CapturedRecording> {
        self.inner.lock().await.captured.clone()
    }

    /// Enter `Starting`, discarding any previous result so a stale recording
    /// is never conflated with the new session. Refused while live.
    pub async fn begin_starting(&self) -> bool {
        let mut session = self.inner.lock().await;
        if session.phase.is_live() {
            return false;
        }
        session.phase = SessionPhase::Starting;
        session.captured = None;
        session.last_error = None;
        true
    }

    pub async fn set_recording(&self) {
        let mut session = self.inner.lock().await;
        session.phase = SessionPhase::Recording;
    }

    /// Record a failure: discards partial media and enters `Error`.
    pub async fn set_error(&self, message: String) {
        let mut session = self.inner.lock().await;
        session.phase = SessionPhase::Error;
        session.captured = None;
        session.last_error = Some(message);
    }

    /// Terminal `Ready` transition. Refused outside a live session so a
    /// stray duplicate terminal event cannot overwrite a finished one.
    pub async fn complete(&self, recording: CapturedRecording) -> bool {
        let mut session = self.inner.lock().await;
        if !session.phase.is_live() {
            return false;
        }
        session.phase = SessionPhase::Ready;
        session.captured = Some(recording);
        session.last_error = None;
        true
    }

    /// Terminal `Error` transition, guarded like [`Self::complete`].
    pub async fn fail_capture(&self, message: String) -> bool {
        let mut session = self.inner.lock().await;
        if !session.phase.is_live() {
            return false;
        }
        session.phase = SessionPhase::Error;
        session.captured = None;
        session.last_error = Some(message);
        true
    }
}
