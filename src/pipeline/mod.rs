//! Pipeline wiring: the capture thread, the processing task and the state
//! they share with a front end.
//!
//! # Architecture
//!
//! ```text
//! spawn_capture_thread()        ← dedicated OS thread, owns the device
//!        │  AudioFrame (bounded mpsc, blocking_send)
//!        ▼
//! RadarPipeline::run()          ← async tokio task, owns the smoother
//!        │  FrameOutput (bounded mpsc, try_send, drops when full)
//!        ▼
//! presentation consumer
//!
//! SharedState (Arc<Mutex<AppState>>) ← config snapshot per frame + diagnostics
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use sound_radar::audio::CpalBackend;
//! use sound_radar::classify::ApiClassifier;
//! use sound_radar::config::AppConfig;
//! use sound_radar::pipeline::{new_shared_state, spawn_capture_thread, RadarPipeline};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let classifier = ApiClassifier::from_config(&config.classifier, 16_000);
//!     let state = new_shared_state(config);
//!     let cancel = Arc::new(AtomicBool::new(false));
//!
//!     let (frame_tx, frame_rx) = mpsc::channel(4);
//!     let (output_tx, mut output_rx) = mpsc::channel(16);
//!
//!     let _capture =
//!         spawn_capture_thread(CpalBackend::new, state.clone(), frame_tx, cancel.clone()).unwrap();
//!     tokio::spawn(RadarPipeline::new(state, Arc::new(classifier)).run(frame_rx, output_tx, cancel));
//!
//!     while let Some(output) = output_rx.recv().await {
//!         println!("{:?}", output.dots);
//!     }
//! }
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{spawn_capture_thread, CaptureThread, PipelineError, RadarPipeline};
pub use state::{new_shared_state, AppState, SharedState};
