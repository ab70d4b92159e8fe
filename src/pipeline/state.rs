//! Shared application state.
//!
//! [`AppState`] holds the live configuration plus the diagnostics a status
//! panel shows: capture status, active device, frame counters and the last
//! classification latency.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>`, cheap to
//! clone and safe to share between the capture thread, the processing task
//! and a settings front end.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audio::{CaptureState, DeviceKind};
use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    /// Current configuration.  The processing task clones it once per frame.
    pub config: AppConfig,

    /// Latest capture state as reported by the capture thread.
    pub capture: CaptureState,

    /// Name and selection kind of the device currently streaming.
    pub device: Option<(String, DeviceKind)>,

    /// Frames that went through classification.
    pub frames_processed: u64,

    /// Frames dropped by the silence gate.
    pub frames_skipped: u64,

    /// Outputs discarded because the consumer was not keeping up.
    pub outputs_dropped: u64,

    /// Average per-channel classification latency of the last frame.
    pub last_latency: Option<Duration>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            capture: CaptureState::Disconnected,
            device: None,
            frames_processed: 0,
            frames_skipped: 0,
            outputs_dropped: 0,
            last_latency: None,
        }
    }

    /// One-line status, e.g. `"Streaming: Speakers (Loopback) | 42 frames"`.
    pub fn status_line(&self) -> String {
        let device = match &self.device {
            Some((name, kind)) => format!("{name} ({})", kind.label()),
            None => "no device".to_string(),
        };
        let mut line = format!(
            "{}: {device} | {} frames",
            self.capture.label(),
            self.frames_processed
        );
        if let Some(latency) = self.last_latency {
            line.push_str(&format!(
                " | Latency: {:.1} ms",
                latency.as_secs_f64() * 1_000.0
            ));
        }
        line
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Lock for a short critical section; do **not** hold the lock across
/// `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state(config: AppConfig) -> SharedState {
    Arc::new(Mutex::new(AppState::new(config)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
