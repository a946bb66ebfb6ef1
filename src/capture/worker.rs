//! The capture worker task.
//!
//! One worker owns at most one [`CaptureContext`] at a time and is stateless
//! between recordings: every terminal event (`Ready` or `Failed`) releases
//! the stream, the recorder and the chunk buffer before the worker idles
//! again. Failures are never retried here — they collapse into a single
//! `Failed` event for the coordinator to surface.

use anyhow::{Context as AnyhowContext, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::mime;
use crate::platform::{CaptureBackend, CaptureHandle, CaptureStream};
use crate::proto::{CaptureCommand, CaptureEvent};

const COMMAND_CHANNEL_CAPACITY: usize = 8;
const CHUNK_CHANNEL_CAPACITY: usize = 32;

/// Spawn the worker task. The returned sender is the only way to reach it;
/// the worker exits when every sender is dropped.
pub fn spawn(
    backend: Arc<dyn CaptureBackend>,
    preferred_mimes: Vec<String>,
    events: mpsc::Sender<CaptureEvent>,
) -> mpsc::Sender<CaptureCommand> {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let worker = CaptureWorker {
        backend,
        preferred_mimes,
        events,
        commands: rx,
        ctx: None,
    };
    tokio::spawn(worker.run());
    tx
}

/// Working state for one recording, destroyed at every terminal event.
struct CaptureContext {
    stream: Box<dyn CaptureStream>,
    chunk_rx: mpsc::Receiver<Vec<u8>>,
    chunks: Vec<Vec<u8>>,
    mime_type: String,
    started_at: Instant,
}

struct CaptureWorker {
    backend: Arc<dyn CaptureBackend>,
    preferred_mimes: Vec<String>,
    events: mpsc::Sender<CaptureEvent>,
    commands: mpsc::Receiver<CaptureCommand>,
    ctx: Option<CaptureContext>,
}

enum Step {
    Command(Option<CaptureCommand>),
    Chunk(Option<Vec<u8>>),
}

impl CaptureWorker {
    async fn run(mut self) {
        debug!("capture worker started");

        loop {
            let step = match self.ctx.as_mut() {
                Some(ctx) => {
                    tokio::select! {
                        command = self.commands.recv() => Step::Command(command),
                        chunk = ctx.chunk_rx.recv() => Step::Chunk(chunk),
                    }
                }
                None => Step::Command(self.commands.recv().await),
            };

            match step {
                Step::Command(None) => break,
                Step::Command(Some(CaptureCommand::Start { handle })) => {
                    self.start_capture(handle).await;
                }
                Step::Command(Some(CaptureCommand::Stop)) => {
                    self.stop_capture().await;
                }
                Step::Chunk(Some(data)) => {
                    if data.is_empty() {
                        continue;
                    }
                    if let Some(ctx) = self.ctx.as_mut() {
                        ctx.chunks.push(data);
                    }
                }
                // The recorder closed its side without a stop signal.
                Step::Chunk(None) => {
                    self.abort_capture("recorder stopped unexpectedly").await;
                }
            }
        }

        // Command channel closed; release anything still live.
        if let Some(mut ctx) = self.ctx.take() {
            ctx.stream.shutdown();
        }
        debug!("capture worker stopped");
    }

    async fn start_capture(&mut self, handle: CaptureHandle) {
        if self.ctx.is_some() {
            warn!("capture already active, ignoring duplicate start");
            return;
        }

        match self.open_pipeline(handle).await {
            Ok(ctx) => {
                info!("capture started ({})", ctx.mime_type);
                self.ctx = Some(ctx);
            }
            Err(e) => self.emit_failure(format!("{e:#}")).await,
        }
    }

    async fn open_pipeline(&mut self, handle: CaptureHandle) -> Result<CaptureContext> {
        let mut stream = self
            .backend
            .acquire(&handle)
            .await
            .context("Failed to acquire capture stream")?;

        // Capture must not silence the source tab; a missing monitor sink is
        // tolerated, the recording itself proceeds.
        if let Err(e) = stream.attach_monitor() {
            warn!("Monitor playback unavailable: {e:#}");
        }

        let mime_type = mime::negotiate(self.backend.as_ref(), &self.preferred_mimes);
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);

        if let Err(e) = stream.start_recorder(&mime_type, chunk_tx) {
            stream.shutdown();
            return Err(e.context("Failed to start recorder"));
        }

        Ok(CaptureContext {
            stream,
            chunk_rx,
            chunks: Vec::new(),
            mime_type,
            started_at: Instant::now(),
        })
    }

    async fn stop_capture(&mut self) {
        let Some(mut ctx) = self.ctx.take() else {
            debug!("stop requested with no active capture");
            return;
        };

        match ctx.stream.finalize().await {
            Ok(()) => {
                // Final chunks can still flush after the stop signal; drain
                // until the recorder closes its side of the channel.
                while let Some(data) = ctx.chunk_rx.recv().await {
                    if !data.is_empty() {
                        ctx.chunks.push(data);
                    }
                }

                let duration_ms = ctx.started_at.elapsed().as_millis() as u64;
                let bytes = ctx.chunks.concat();
                ctx.stream.shutdown();

                info!("capture finished: {} bytes over {}ms", bytes.len(), duration_ms);
                self.emit(CaptureEvent::Ready {
                    bytes,
                    mime_type: ctx.mime_type,
                    duration_ms,
                })
                .await;
            }
            Err(e) => {
                ctx.stream.shutdown();
                self.emit_failure(format!("{e:#}")).await;
            }
        }
    }

    async fn abort_capture(&mut self, reason: &str) {
        if let Some(mut ctx) = self.ctx.take() {
            ctx.stream.shutdown();
        }
        self.emit_failure(reason.to_string()).await;
    }

    async fn emit_failure(&mut self, message: String) {
        self.emit(CaptureEvent::Failed { message }).await;
    }

    async fn emit(&mut self, event: CaptureEvent) {
        if self.events.send(event).await.is_err() {
            warn!("coordinator is gone; dropping capture event");
        }
    }
}
