//! `cpal` implementation of [`AudioBackend`].
//!
//! The cpal callback runs on the host's audio thread and forwards each
//! buffer over a bounded channel; [`CpalStream::read`] accumulates buffers
//! until a full frame is available.  When the reader falls behind far
//! enough to fill the channel, the callback drops buffers and the next
//! `read` reports a buffer discontinuity.  Dropping the stream stops the
//! hardware stream.
//!
//! `cpal::Stream` is not `Send` on every platform, so a [`CpalBackend`]
//! must be created on the thread that reads from it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::capture::CaptureError;
use super::device::{AudioBackend, DeviceCatalog, Endpoint, InputStream, ResolvedDevice};

const READ_POLL: Duration = Duration::from_millis(50);

/// Callback buffers held between reads.  Hosts deliver roughly 10 ms per
/// callback, so this is a few seconds of audio.
const CHUNK_QUEUE_CAPACITY: usize = 512;

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn transient(context: &str, err: impl std::fmt::Display) -> CaptureError {
    CaptureError::Transient(format!("{context}: {err}"))
}

fn from_build_error(err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => {
            CaptureError::DeviceInvalidated("device not available".into())
        }
        other => transient("failed to build input stream", other),
    }
}

fn from_stream_error(err: cpal::StreamError) -> CaptureError {
    match err {
        cpal::StreamError::DeviceNotAvailable => {
            CaptureError::DeviceInvalidated("device not available".into())
        }
        other => transient("stream error", other),
    }
}

// ---------------------------------------------------------------------------
// CpalBackend
// ---------------------------------------------------------------------------

pub struct CpalBackend {
    host: cpal::Host,
}

impl CpalBackend {
    /// Use the platform's default audio host.
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn find_device(&self, device: &ResolvedDevice) -> Result<cpal::Device, CaptureError> {
        let devices: Vec<cpal::Device> = match device.endpoint {
            Endpoint::Input => self
                .host
                .input_devices()
                .map_err(|e| transient("failed to enumerate input devices", e))?
                .collect(),
            Endpoint::Output => self
                .host
                .output_devices()
                .map_err(|e| transient("failed to enumerate output devices", e))?
                .collect(),
        };

        devices
            .into_iter()
            .find(|d| d.name().map(|n| n == device.name).unwrap_or(false))
            .ok_or_else(|| {
                CaptureError::DeviceInvalidated(format!("device {:?} disappeared", device.name))
            })
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Names of every capture device on the default host.
///
/// # Errors
///
/// Returns [`CaptureError::Transient`] when the host cannot enumerate
/// devices.
pub fn list_devices() -> Result<Vec<String>, CaptureError> {
    CpalBackend::new().catalog().map(|c| c.input_devices)
}

impl AudioBackend for CpalBackend {
    type Stream = CpalStream;

    fn catalog(&self) -> Result<DeviceCatalog, CaptureError> {
        let input_devices = self
            .host
            .input_devices()
            .map_err(|e| transient("failed to enumerate input devices", e))?
            .filter_map(|d| d.name().ok())
            .collect();

        Ok(DeviceCatalog {
            input_devices,
            default_output: self.host.default_output_device().and_then(|d| d.name().ok()),
            default_input: self.host.default_input_device().and_then(|d| d.name().ok()),
            // WASAPI can open render endpoints in loopback mode.
            output_loopback: cfg!(target_os = "windows"),
        })
    }

    fn open(
        &mut self,
        device: &ResolvedDevice,
        sample_rate: u32,
    ) -> Result<CpalStream, CaptureError> {
        let dev = self.find_device(device)?;

        let default = match device.endpoint {
            Endpoint::Input => dev.default_input_config(),
            Endpoint::Output => dev.default_output_config(),
        }
        .map_err(|e| transient("failed to query default config", e))?;

        let requested = cpal::StreamConfig {
            channels: default.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        match CpalStream::start(&dev, &requested) {
            Err(CaptureError::Transient(msg)) if default.sample_rate().0 != sample_rate => {
                log::warn!(
                    "capture: {sample_rate} Hz rejected ({msg}), using device rate {} Hz",
                    default.sample_rate().0
                );
                CpalStream::start(&dev, &default.config())
            }
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Chunk queue
// ---------------------------------------------------------------------------

/// Callback side of the capture buffer.  Never blocks.
struct ChunkSender {
    tx: SyncSender<Vec<f32>>,
    overrun: Arc<AtomicBool>,
}

impl ChunkSender {
    fn push(&self, data: &[f32]) {
        match self.tx.try_send(data.to_vec()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.overrun.store(true, Ordering::Relaxed),
            // The receiver may already be gone during teardown.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Reader side of the capture buffer.
struct ChunkReceiver {
    rx: Receiver<Vec<f32>>,
    overrun: Arc<AtomicBool>,
}

impl ChunkReceiver {
    /// `true` once after buffers were dropped.  The stale backlog is
    /// discarded so reading resumes at live audio.
    fn take_overrun(&self) -> bool {
        if !self.overrun.swap(false, Ordering::Relaxed) {
            return false;
        }
        while self.rx.try_recv().is_ok() {}
        true
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Vec<f32>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

fn chunk_queue(capacity: usize) -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let overrun = Arc::new(AtomicBool::new(false));
    (
        ChunkSender {
            tx,
            overrun: Arc::clone(&overrun),
        },
        ChunkReceiver { rx, overrun },
    )
}

// ---------------------------------------------------------------------------
// CpalStream
// ---------------------------------------------------------------------------

pub struct CpalStream {
    _stream: cpal::Stream,
    chunks: ChunkReceiver,
    err_rx: Receiver<cpal::StreamError>,
    pending: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl CpalStream {
    fn start(device: &cpal::Device, config: &cpal::StreamConfig) -> Result<Self, CaptureError> {
        let (chunk_tx, chunks) = chunk_queue(CHUNK_QUEUE_CAPACITY);
        let (err_tx, err_rx) = mpsc::channel::<cpal::StreamError>();

        let stream = device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| chunk_tx.push(data),
                move |err: cpal::StreamError| {
                    log::error!("cpal stream error: {err}");
                    let _ = err_tx.send(err);
                },
                None,
            )
            .map_err(from_build_error)?;

        stream
            .play()
            .map_err(|e| transient("failed to start audio stream", e))?;

        Ok(Self {
            _stream: stream,
            chunks,
            err_rx,
            pending: Vec::new(),
            channels: config.channels,
            sample_rate: config.sample_rate.0,
        })
    }
}

impl InputStream for CpalStream {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, frames: usize, cancel: &AtomicBool) -> Result<Vec<f32>, CaptureError> {
        let wanted = frames * self.channels as usize;

        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(CaptureError::Cancelled);
            }

            match self.err_rx.try_recv() {
                Ok(err) => {
                    self.pending.clear();
                    return Err(from_stream_error(err));
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    return Err(CaptureError::DeviceInvalidated("stream closed".into()));
                }
            }

            if self.chunks.take_overrun() {
                self.pending.clear();
                return Err(CaptureError::Transient("buffer discontinuity".into()));
            }

            if self.pending.len() >= wanted {
                return Ok(self.pending.drain(..wanted).collect());
            }

            // Loopback delivers nothing while the output is idle; keep waiting.
            match self.chunks.recv_timeout(READ_POLL) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::DeviceInvalidated("stream closed".into()));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
