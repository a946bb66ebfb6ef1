//! Native deployment variant: system audio capture via monitor sources.
//!
//! PipeWire/PulseAudio expose the system's audio output (speakers or
//! headphones) as an input device whose name contains "Monitor". In this
//! variant that monitor source stands in for "the active tab": whatever is
//! playing through the default output is what gets captured. Samples are
//! accumulated from the cpal callback and encoded to WAV when the recorder
//! finalizes.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated capture
//! thread that parks until it is told to stop. The async side only touches
//! the shared sample buffer and the stop signal.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{CaptureBackend, CaptureHandle, CaptureStream, TabId, TabPlatform};

const STREAM_START_TIMEOUT: Duration = Duration::from_secs(5);

/// Find a PipeWire/PulseAudio monitor source via cpal.
fn find_monitor_device() -> Option<(String, u32)> {
    let host = cpal::default_host();

    for device in host.input_devices().ok()? {
        if let Ok(name) = device.name() {
            if name.to_lowercase().contains("monitor") {
                if let Ok(config) = device.default_input_config() {
                    return Some((name, config.sample_rate().0));
                }
            }
        }
    }

    None
}

fn find_device_by_name(name: &str) -> Option<(cpal::Device, u32)> {
    let host = cpal::default_host();

    for device in host.input_devices().ok()? {
        if device.name().map(|n| n == name).unwrap_or(false) {
            if let Ok(config) = device.default_input_config() {
                return Some((device, config.sample_rate().0));
            }
        }
    }

    None
}

/// Tab resolution against the local audio stack.
#[derive(Default)]
pub struct MonitorPlatform;

impl MonitorPlatform {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TabPlatform for MonitorPlatform {
    async fn active_tab(&self) -> Result<Option<TabId>> {
        Ok(find_monitor_device().map(|(name, sample_rate)| {
            info!("Active capture target: {} ({}Hz)", name, sample_rate);
            TabId(name)
        }))
    }

    async fn capture_handle(&self, tab: &TabId) -> Result<CaptureHandle> {
        // The source can disappear between resolution and capture (device
        // unplugged, audio server restarted); re-check before issuing.
        find_device_by_name(&tab.0)
            .ok_or_else(|| anyhow!("monitor source {} is no longer available", tab.0))?;

        Ok(CaptureHandle(tab.0.clone()))
    }
}

/// Recording primitive over a monitor source.
#[derive(Default)]
pub struct MonitorBackend;

impl MonitorBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CaptureBackend for MonitorBackend {
    async fn acquire(&self, handle: &CaptureHandle) -> Result<Box<dyn CaptureStream>> {
        let (_, sample_rate) = find_device_by_name(handle.as_str())
            .ok_or_else(|| anyhow!("no input device matches capture handle {}", handle.as_str()))?;

        Ok(Box::new(MonitorStream {
            device_name: handle.as_str().to_string(),
            sample_rate,
            samples: Arc::new(Mutex::new(Vec::new())),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            recorder: None,
        }))
    }

    fn supports_mime(&self, mime: &str) -> bool {
        matches!(mime, "audio/wav" | "audio/x-wav" | "audio/wave")
    }

    fn default_mime(&self) -> &str {
        "audio/wav"
    }
}

struct RecorderThread {
    stop_tx: std_mpsc::Sender<()>,
    join: JoinHandle<()>,
    sink: mpsc::Sender<Vec<u8>>,
}

pub struct MonitorStream {
    device_name: String,
    sample_rate: u32,
    samples: Arc<Mutex<Vec<f32>>>,
    /// Signals the audio callback to stop writing before the stream drops.
    shutdown_flag: Arc<AtomicBool>,
    recorder: Option<RecorderThread>,
}

#[async_trait]
impl CaptureStream for MonitorStream {
    fn attach_monitor(&mut self) -> Result<()> {
        // The monitor source mirrors the default output; the captured audio
        // is already audible on the speakers without extra routing.
        debug!(
            "{} plays through the default output; no monitor sink needed",
            self.device_name
        );
        Ok(())
    }

    fn start_recorder(&mut self, mime_type: &str, sink: mpsc::Sender<Vec<u8>>) -> Result<()> {
        if self.recorder.is_some() {
            bail!("recorder already running");
        }
        if !matches!(mime_type, "audio/wav" | "audio/x-wav" | "audio/wave") {
            bail!("unsupported mime type for monitor capture: {mime_type}");
        }

        {
            let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
            samples.clear();
            samples.shrink_to_fit();
        }
        self.shutdown_flag.store(false, Ordering::Release);

        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), String>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let device_name = self.device_name.clone();
        let samples = Arc::clone(&self.samples);
        let shutdown_flag = Arc::clone(&self.shutdown_flag);

        let join = std::thread::spawn(move || {
            let Some((device, sample_rate)) = find_device_by_name(&device_name) else {
                let _ = ready_tx.send(Err(format!("monitor source {device_name} is gone")));
                return;
            };

            let config = cpal::StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let callback_samples = Arc::clone(&samples);
            let callback_shutdown = Arc::clone(&shutdown_flag);
            let err_fn = |err| error!("Monitor audio stream error: {}", err);

            let stream = match device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if callback_shutdown.load(Ordering::Acquire) {
                        return;
                    }
                    let mut buf = callback_samples.lock().unwrap_or_else(|e| {
                        error!("Sample buffer lock poisoned, recovering: {}", e);
                        e.into_inner()
                    });
                    buf.extend_from_slice(data);
                },
                err_fn,
                None,
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to build capture stream: {e}")));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start capture stream: {e}")));
                return;
            }

            let _ = ready_tx.send(Ok(()));

            // Parked until finalize or shutdown; the stream records meanwhile.
            let _ = stop_rx.recv();
            shutdown_flag.store(true, Ordering::Release);
            drop(stream);
        });

        match ready_rx.recv_timeout(STREAM_START_TIMEOUT) {
            Ok(Ok(())) => {
                info!("Monitor capture started on {}", self.device_name);
                self.recorder = Some(RecorderThread {
                    stop_tx,
                    join,
                    sink,
                });
                Ok(())
            }
            Ok(Err(message)) => {
                let _ = join.join();
                bail!(message)
            }
            Err(_) => {
                self.shutdown_flag.store(true, Ordering::Release);
                bail!("timed out waiting for the capture stream to start")
            }
        }
    }

    async fn finalize(&mut self) -> Result<()> {
        let Some(recorder) = self.recorder.take() else {
            bail!("recorder not running");
        };

        let _ = recorder.stop_tx.send(());
        let join = recorder.join;
        let joined = tokio::task::spawn_blocking(move || join.join())
            .await
            .context("capture thread join was cancelled")?;
        if joined.is_err() {
            bail!("capture thread panicked");
        }

        let samples = {
            let mut guard = self.samples.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };

        info!(
            "Monitor capture stopped, {} samples captured",
            samples.len()
        );

        let wav = encode_wav(&samples, self.sample_rate)?;
        // The worker drains the sink after finalize; dropping the sender here
        // (with `recorder`) is what closes the channel.
        if recorder.sink.send(wav).await.is_err() {
            warn!("capture sink closed before the final flush");
        }

        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            self.shutdown_flag.store(true, Ordering::Release);
            let _ = recorder.stop_tx.send(());
            debug!("Monitor capture thread for {} released", self.device_name);
        }

        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.clear();
        samples.shrink_to_fit();
    }
}

impl Drop for MonitorStream {
    fn drop(&mut self) {
        if self.recorder.is_some() {
            debug!("Dropping active MonitorStream, cleaning up");
            self.shutdown();
        }
    }
}

fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
