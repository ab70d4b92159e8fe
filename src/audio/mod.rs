//! Audio layer: device capture → resampling → pre-processing.
//!
//! # Pipeline
//!
//! ```text
//! loopback device → cpal callback → CpalStream (mpsc, accumulate)
//!     → CaptureSource (retry state machine) → resample_interleaved (rubato)
//!     → AudioFrame @ 16 kHz → Preprocessor (hamming / normalize / gate)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use sound_radar::audio::{CaptureSource, CpalBackend};
//! use sound_radar::config::CaptureConfig;
//!
//! let cancel = AtomicBool::new(false);
//! let mut source = CaptureSource::open(CpalBackend::new(), CaptureConfig::default()).unwrap();
//!
//! while let Ok(frame) = source.next_frame(&cancel) {
//!     println!("{} ch × {} samples @ {} Hz", frame.channels(), frame.len(), frame.sample_rate());
//! }
//! ```

pub mod capture;
pub mod cpal_backend;
pub mod device;
pub mod frame;
pub mod preprocess;
pub mod resample;

pub use capture::{frame_len, CaptureError, CaptureSource, CaptureState, Recovery, RetryPolicy};
pub use cpal_backend::{list_devices, CpalBackend, CpalStream};
pub use device::{
    resolve_device, AudioBackend, DeviceCatalog, DeviceKind, Endpoint, InputStream,
    ResolvedDevice,
};
pub use frame::AudioFrame;
pub use preprocess::{hamming_window, peak, rms, Preprocessor};
pub use resample::{resample_interleaved, resampled_len, ResampleError};
