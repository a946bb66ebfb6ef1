//! Platform integration seams.
//!
//! Tab resolution, capture-handle issuance and the recording primitive are
//! external collaborators: the core only depends on these traits. The native
//! deployment wires in the monitor-source implementations from
//! [`monitor`]; tests script their own.

pub mod monitor;

pub use monitor::{MonitorBackend, MonitorPlatform};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Identifier of a capturable tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabId(pub String);

/// Opaque platform-issued token scoping a media stream to one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHandle(pub String);

impl CaptureHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolves tabs and issues capture handles.
#[async_trait]
pub trait TabPlatform: Send + Sync {
    /// The currently focused capturable tab, if any.
    async fn active_tab(&self) -> Result<Option<TabId>>;

    /// Ask the platform for a capture handle scoped to `tab`. An error means
    /// the platform denied capture.
    async fn capture_handle(&self, tab: &TabId) -> Result<CaptureHandle>;
}

/// The recording primitive. Encoding internals live entirely behind this
/// seam; the worker only negotiates a mime type and accumulates chunks.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Acquire a live media stream scoped to `handle`. An error means the
    /// stream was denied or the source is gone.
    async fn acquire(&self, handle: &CaptureHandle) -> Result<Box<dyn CaptureStream>>;

    /// Whether the backend can encode this container/codec combination.
    fn supports_mime(&self, mime: &str) -> bool;

    /// Unqualified fallback when nothing on the preference list is supported.
    fn default_mime(&self) -> &str;
}

/// One live media stream plus its recorder.
#[async_trait]
pub trait CaptureStream: Send {
    /// Attach a local playback sink so the captured tab stays audible.
    fn attach_monitor(&mut self) -> Result<()>;

    /// Start the recorder. Encoded chunks flow into `sink` as they are
    /// produced.
    fn start_recorder(&mut self, mime_type: &str, sink: mpsc::Sender<Vec<u8>>) -> Result<()>;

    /// Finalize the recorder. Resolves only after the final chunk flush; the
    /// sink is closed before this returns, so draining the receiver after a
    /// successful finalize observes every chunk.
    async fn finalize(&mut self) -> Result<()>;

    /// Release tracks and any live resources. Idempotent; called on every
    /// exit path.
    fn shutdown(&mut self);
}
