//! Capture thread and processing task.
//!
//! ```text
//! capture thread (OS)                     processing task (tokio)
//! ───────────────────                     ────────────────────────
//! CaptureSource::next_frame()             recv AudioFrame
//!   └─ blocking_send(frame) ──mpsc──▶       ├─ snapshot config
//!                                           ├─ Preprocessor   (silence gate)
//!                                           ├─ ChannelMap::build
//!                                           ├─ VectorAggregator  [classify/ch]
//!                                           ├─ TemporalSmoother
//!                                           ├─ FrameEmitter
//!                                           └─ try_send(FrameOutput) ──▶ consumer
//! ```
//!
//! The capture thread owns the device; the processing task owns the
//! smoother.  The task never waits for the consumer: outputs that do not fit
//! in the channel are dropped and counted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::state::SharedState;
use crate::audio::{AudioBackend, AudioFrame, CaptureError, CaptureSource, Preprocessor};
use crate::classify::{ClassificationAdapter, SoundClassifier};
use crate::radar::{ChannelMap, FrameEmitter, FrameOutput, TemporalSmoother, VectorAggregator};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("capture thread panicked")]
    CapturePanicked,
}

// ---------------------------------------------------------------------------
// Capture thread
// ---------------------------------------------------------------------------

/// Handle to the running capture thread.
pub struct CaptureThread {
    handle: JoinHandle<Result<(), CaptureError>>,
}

impl CaptureThread {
    /// Wait for the thread to finish.  Set the cancel flag (or drop the
    /// frame receiver) first.
    pub fn join(self) -> Result<(), PipelineError> {
        match self.handle.join() {
            Ok(result) => result.map_err(PipelineError::from),
            Err(_) => Err(PipelineError::CapturePanicked),
        }
    }
}

/// Spawn a named OS thread that streams frames into `frame_tx` until
/// `cancel` is set or the receiver is dropped.
///
/// The backend is built on the new thread because audio streams are not
/// `Send` on every platform.  Capture state and the active device are
/// mirrored into `state`; the frame duration is re-read before every frame.
pub fn spawn_capture_thread<B, F>(
    make_backend: F,
    state: SharedState,
    frame_tx: mpsc::Sender<AudioFrame>,
    cancel: Arc<AtomicBool>,
) -> Result<CaptureThread, PipelineError>
where
    B: AudioBackend + 'static,
    F: FnOnce() -> B + Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name("audio-capture".into())
        .spawn(move || {
            let config = state.lock().unwrap().config.capture.clone();
            let observed = Arc::clone(&state);
            let mut source =
                CaptureSource::new(make_backend(), config).on_state_change(move |s, device| {
                    let mut st = observed.lock().unwrap();
                    st.capture = s.clone();
                    st.device = device.map(|d| (d.name.clone(), d.kind));
                });

            loop {
                let secs = state.lock().unwrap().config.capture.frame_duration_secs;
                source.set_frame_duration(secs);

                match source.next_frame(&cancel) {
                    Ok(frame) => {
                        if frame_tx.blocking_send(frame).is_err() {
                            log::info!("capture: frame receiver closed, stopping");
                            return Ok(());
                        }
                    }
                    Err(CaptureError::Cancelled) => {
                        log::info!("capture: cancelled");
                        return Ok(());
                    }
                    Err(err) => {
                        log::error!("capture: stopped on unexpected error: {err}");
                        return Err(err);
                    }
                }
            }
        })?;

    Ok(CaptureThread { handle })
}

// ---------------------------------------------------------------------------
// RadarPipeline
// ---------------------------------------------------------------------------

/// Per-frame processing: pre-processing, aggregation, smoothing, output.
///
/// ```rust,no_run
/// use std::sync::atomic::AtomicBool;
/// use std::sync::Arc;
/// use sound_radar::classify::ApiClassifier;
/// use sound_radar::config::AppConfig;
/// use sound_radar::pipeline::{new_shared_state, RadarPipeline};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let classifier = ApiClassifier::from_config(&config.classifier, 16_000);
/// let state = new_shared_state(config);
///
/// let (frame_tx, frame_rx) = tokio::sync::mpsc::channel(4);
/// let (output_tx, mut output_rx) = tokio::sync::mpsc::channel(16);
/// let cancel = Arc::new(AtomicBool::new(false));
///
/// let pipeline = RadarPipeline::new(state, Arc::new(classifier));
/// tokio::spawn(pipeline.run(frame_rx, output_tx, cancel));
/// # drop(frame_tx);
/// while let Some(frame) = output_rx.recv().await {
///     println!("{frame:?}");
/// }
/// # }
/// ```
pub struct RadarPipeline {
    state: SharedState,
    classifier: ClassificationAdapter,
    smoother: TemporalSmoother,
}

impl RadarPipeline {
    pub fn new(state: SharedState, classifier: Arc<dyn SoundClassifier>) -> Self {
        let alpha = state.lock().unwrap().config.radar.smoothing_factor;
        Self {
            state,
            classifier: ClassificationAdapter::new(classifier),
            smoother: TemporalSmoother::new(alpha),
        }
    }

    /// Smoother state, for diagnostics.
    pub fn smoother(&self) -> &TemporalSmoother {
        &self.smoother
    }

    /// Process frames until the capture side hangs up, the consumer goes
    /// away, or `cancel` is set.
    pub async fn run(
        mut self,
        mut frame_rx: mpsc::Receiver<AudioFrame>,
        output_tx: mpsc::Sender<FrameOutput>,
        cancel: Arc<AtomicBool>,
    ) {
        while let Some(frame) = frame_rx.recv().await {
            if cancel.load(Ordering::Relaxed) {
                break;
            }

            let Some(output) = self.process_frame(frame).await else {
                continue;
            };

            match output_tx.try_send(output) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    log::debug!("pipeline: consumer busy, dropping frame output");
                    self.state.lock().unwrap().outputs_dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    log::info!("pipeline: output consumer closed");
                    break;
                }
            }
        }

        log::info!("pipeline: processing task shutting down");
    }

    /// Run one frame through the whole chain.
    ///
    /// Returns `None` when the frame is gated as silent or when the output
    /// would carry nothing.
    pub async fn process_frame(&mut self, frame: AudioFrame) -> Option<FrameOutput> {
        let config = self.state.lock().unwrap().config.clone();

        let device_kind = frame.device_kind();
        let channels = frame.channels();

        let Some(frame) = Preprocessor::from_config(&config.processing).process(frame) else {
            self.state.lock().unwrap().frames_skipped += 1;
            return None;
        };

        let map = ChannelMap::build(channels, config.radar.channel_layout);
        let aggregator =
            VectorAggregator::new(config.classifier.confidence_threshold, config.classifier.top_k);
        let aggregation = aggregator.aggregate(&frame, &map, &self.classifier).await;

        let smoothed = if config.radar.enabled {
            self.smoother.set_alpha(config.radar.smoothing_factor);
            self.smoother.update(aggregation.mode, &aggregation.detections)
        } else {
            self.smoother.clear();
            Vec::new()
        };

        {
            let mut st = self.state.lock().unwrap();
            st.frames_processed += 1;
            st.last_latency = Some(aggregation.average_latency());
        }

        log::debug!(
            "pipeline: {} ch, {} detection(s), {} tracked, {:?} total latency",
            channels,
            aggregation.detections.len(),
            self.smoother.len(),
            aggregation.total_latency()
        );

        let emitter = FrameEmitter {
            radar_enabled: config.radar.enabled,
            show_channel_levels: config.radar.show_channel_levels,
            show_debug: config.radar.show_debug,
        };
        emitter.emit(&aggregation, &smoothed, device_kind, channels)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
