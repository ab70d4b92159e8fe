//! Resilient continuous capture.
//!
//! [`CaptureSource`] owns the device stream and turns it into an endless
//! sequence of resampled [`AudioFrame`]s.  Device failures never reach the
//! caller: they drive a small state machine instead.
//!
//! ```text
//! Disconnected ──▶ Connecting ──ok──▶ Streaming ──frame──▶ (caller)
//!                     ▲   │                │
//!                     │   └──err──┐        └──err──┐
//!                     │           ▼                ▼
//!                     └──────── Error ◀────────────┘
//!                  stream invalidated: reconnect now
//!                  anything else:      wait backoff, reconnect
//! ```
//!
//! A reconnect that fails waits out the backoff even when the device
//! reported itself invalidated.
//!
//! The only error [`CaptureSource::next_frame`] returns is
//! [`CaptureError::Cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

use super::device::{resolve_device, AudioBackend, InputStream, ResolvedDevice};
use super::frame::AudioFrame;
use super::resample::{resample_interleaved, ResampleError};
use crate::config::CaptureConfig;

/// Granularity of cancellable waits.
const CANCEL_POLL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("no audio capture device available")]
    NoDeviceAvailable,

    /// The device disappeared or was reconfigured under us.
    #[error("capture device invalidated: {0}")]
    DeviceInvalidated(String),

    /// Buffer discontinuity, backend hiccup, failed resample.
    #[error("transient capture error: {0}")]
    Transient(String),

    #[error("capture cancelled")]
    Cancelled,
}

impl From<ResampleError> for CaptureError {
    fn from(e: ResampleError) -> Self {
        CaptureError::Transient(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// CaptureState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Disconnected,
    Connecting,
    Streaming,
    Error(CaptureError),
}

impl CaptureState {
    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            CaptureState::Disconnected => "Disconnected",
            CaptureState::Connecting => "Connecting",
            CaptureState::Streaming => "Streaming",
            CaptureState::Error(_) => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// What to do after a capture error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Re-acquire the device immediately.
    Reacquire,
    /// Wait, then re-acquire.
    Backoff(Duration),
    /// Leave the capture loop.
    Stop,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    pub fn recovery(&self, error: &CaptureError) -> Recovery {
        match error {
            CaptureError::Cancelled => Recovery::Stop,
            CaptureError::DeviceInvalidated(_) => Recovery::Reacquire,
            CaptureError::NoDeviceAvailable | CaptureError::Transient(_) => {
                Recovery::Backoff(self.backoff)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1_500))
    }
}

/// Sleep for `duration` in short slices.  Returns `false` if `cancel` was
/// set before the time elapsed.
pub fn sleep_cancellable(duration: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(CANCEL_POLL.min(deadline - now));
    }
}

/// Relative distance from a whole sample count that still counts as exact.
const FRAME_LEN_TOLERANCE: f64 = 1e-6;

/// Native frame length for `duration_secs` at `rate`, never zero.
pub fn frame_len(rate: u32, duration_secs: f32) -> usize {
    // An f32 such as 0.7 sits just below its decimal value, so a product a
    // hair under a whole number is taken as that number before flooring.
    let exact = rate as f64 * duration_secs as f64;
    let nearest = exact.round();
    let samples = if (exact - nearest).abs() <= nearest * FRAME_LEN_TOLERANCE {
        nearest
    } else {
        exact.floor()
    };
    (samples as usize).max(1)
}

// ---------------------------------------------------------------------------
// CaptureSource
// ---------------------------------------------------------------------------

type StateObserver = Box<dyn FnMut(&CaptureState, Option<&ResolvedDevice>) + Send>;

/// Owns the device handle and yields resampled frames forever.
pub struct CaptureSource<B: AudioBackend> {
    backend: B,
    config: CaptureConfig,
    policy: RetryPolicy,
    state: CaptureState,
    stream: Option<B::Stream>,
    device: Option<ResolvedDevice>,
    observer: Option<StateObserver>,
    /// Set when the last connection attempt failed; cleared once streaming.
    connect_failed: bool,
}

impl<B: AudioBackend> CaptureSource<B> {
    /// Create a source that connects lazily on the first
    /// [`next_frame`](Self::next_frame), retrying until a device appears.
    pub fn new(backend: B, config: CaptureConfig) -> Self {
        let policy = RetryPolicy::new(Duration::from_millis(config.reconnect_backoff_ms));
        Self {
            backend,
            config,
            policy,
            state: CaptureState::Disconnected,
            stream: None,
            device: None,
            observer: None,
            connect_failed: false,
        }
    }

    /// Resolve and open a device.
    ///
    /// # Errors
    ///
    /// Any error from the first connection attempt, typically
    /// [`CaptureError::NoDeviceAvailable`].  Later failures are absorbed by
    /// [`next_frame`](Self::next_frame).
    pub fn open(backend: B, config: CaptureConfig) -> Result<Self, CaptureError> {
        let mut source = Self::new(backend, config);
        source.connect()?;
        Ok(source)
    }

    /// Register a callback invoked on every state transition.
    pub fn on_state_change(
        mut self,
        observer: impl FnMut(&CaptureState, Option<&ResolvedDevice>) + Send + 'static,
    ) -> Self {
        let mut observer: StateObserver = Box::new(observer);
        observer(&self.state, self.device.as_ref());
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn device(&self) -> Option<&ResolvedDevice> {
        self.device.as_ref()
    }

    /// Frame duration used from the next frame on.
    pub fn set_frame_duration(&mut self, secs: f32) {
        if secs > 0.0 {
            self.config.frame_duration_secs = secs;
        }
    }

    /// Block until the next complete frame is captured and resampled.
    ///
    /// Device errors are retried internally; only cancellation returns.
    pub fn next_frame(&mut self, cancel: &AtomicBool) -> Result<AudioFrame, CaptureError> {
        loop {
            if cancel.load(Ordering::Relaxed) {
                self.stream = None;
                self.set_state(CaptureState::Disconnected);
                return Err(CaptureError::Cancelled);
            }

            match self.state.clone() {
                CaptureState::Disconnected | CaptureState::Connecting => {
                    if let Err(err) = self.connect() {
                        log::warn!("capture: re-acquisition failed: {err}");
                        self.connect_failed = true;
                        self.set_state(CaptureState::Error(err));
                    }
                }
                CaptureState::Streaming => match self.read_frame(cancel) {
                    Ok(frame) => return Ok(frame),
                    Err(CaptureError::Cancelled) => continue,
                    Err(err) => {
                        log::warn!("capture: stream failed: {err}");
                        self.stream = None;
                        self.set_state(CaptureState::Error(err));
                    }
                },
                // Only a stream that was running gets an immediate retry; a
                // failed re-acquisition always waits out the backoff.
                CaptureState::Error(err) => match self.policy.recovery(&err) {
                    Recovery::Stop => return Err(err),
                    Recovery::Reacquire if self.connect_failed => {
                        let wait = self.policy.backoff;
                        log::info!(
                            "capture: device still unavailable, retrying in {} ms",
                            wait.as_millis()
                        );
                        if sleep_cancellable(wait, cancel) {
                            self.set_state(CaptureState::Connecting);
                        }
                    }
                    Recovery::Reacquire => {
                        log::info!("capture: device invalidated, re-acquiring now");
                        self.set_state(CaptureState::Connecting);
                    }
                    Recovery::Backoff(wait) => {
                        log::info!("capture: retrying in {} ms", wait.as_millis());
                        if sleep_cancellable(wait, cancel) {
                            self.set_state(CaptureState::Connecting);
                        }
                    }
                },
            }
        }
    }

    fn connect(&mut self) -> Result<(), CaptureError> {
        self.stream = None;
        self.set_state(CaptureState::Connecting);

        let catalog = self.backend.catalog()?;
        let device = resolve_device(self.config.device.as_deref(), &catalog)?;
        let stream = self
            .backend
            .open(&device, self.config.native_sample_rate)?;

        log::info!(
            "capture: streaming from {:?} ({}, {} Hz, {} ch)",
            device.name,
            device.kind.label(),
            stream.sample_rate(),
            stream.channels()
        );

        self.stream = Some(stream);
        self.device = Some(device);
        self.connect_failed = false;
        self.set_state(CaptureState::Streaming);
        Ok(())
    }

    fn read_frame(&mut self, cancel: &AtomicBool) -> Result<AudioFrame, CaptureError> {
        let kind = self
            .device
            .as_ref()
            .map(|d| d.kind)
            .ok_or_else(|| CaptureError::DeviceInvalidated("no resolved device".into()))?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CaptureError::DeviceInvalidated("no open stream".into()))?;

        let native_rate = stream.sample_rate();
        let channels = stream.channels();
        let frames = frame_len(native_rate, self.config.frame_duration_secs);

        let raw = stream.read(frames, cancel)?;
        let target_rate = self.config.target_sample_rate;
        let samples = resample_interleaved(&raw, channels, native_rate, target_rate)?;

        Ok(AudioFrame::new(samples, channels, target_rate, kind))
    }

    fn set_state(&mut self, state: CaptureState) {
        if self.state == state {
            return;
        }
        log::debug!("capture: {} → {}", self.state.label(), state.label());
        self.state = state;
        if let Some(observer) = self.observer.as_mut() {
            observer(&self.state, self.device.as_ref());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::{DeviceCatalog, DeviceKind};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    struct ScriptedStream {
        channels: u16,
        rate: u32,
        reads: VecDeque<Result<(), CaptureError>>,
    }

    impl InputStream for ScriptedStream {
        fn channels(&self) -> u16 {
            self.channels
        }

        fn sample_rate(&self) -> u32 {
            self.rate
        }

        fn read(&mut self, frames: usize, cancel: &AtomicBool) -> Result<Vec<f32>, CaptureError> {
            if cancel.load(Ordering::Relaxed) {
                return Err(CaptureError::Cancelled);
            }
            match self.reads.pop_front() {
                Some(Ok(())) => Ok(vec![0.0; frames * self.channels as usize]),
                Some(Err(e)) => Err(e),
                None => Err(CaptureError::DeviceInvalidated("script exhausted".into())),
            }
        }
    }

    /// Each `catalog` call consumes one scripted catalog; the last repeats.
    struct ScriptedBackend {
        catalogs: Mutex<VecDeque<DeviceCatalog>>,
        streams: VecDeque<ScriptedStream>,
        opened: Arc<Mutex<Vec<String>>>,
    }

    impl AudioBackend for ScriptedBackend {
        type Stream = ScriptedStream;

        fn catalog(&self) -> Result<DeviceCatalog, CaptureError> {
            let mut catalogs = self.catalogs.lock().unwrap();
            if catalogs.len() > 1 {
                Ok(catalogs.pop_front().unwrap_or_default())
            } else {
                Ok(catalogs.front().cloned().unwrap_or_default())
            }
        }

        fn open(
            &mut self,
            device: &ResolvedDevice,
            _sample_rate: u32,
        ) -> Result<ScriptedStream, CaptureError> {
            self.opened.lock().unwrap().push(device.name.clone());
            self.streams
                .pop_front()
                .ok_or_else(|| CaptureError::Transient("no stream scripted".into()))
        }
    }

    fn loopback_catalog() -> DeviceCatalog {
        DeviceCatalog {
            input_devices: vec!["Monitor of Speakers".into()],
            default_output: Some("Speakers".into()),
            default_input: None,
            output_loopback: false,
        }
    }

    fn stream(reads: Vec<Result<(), CaptureError>>) -> ScriptedStream {
        ScriptedStream {
            channels: 2,
            rate: 32_000,
            reads: reads.into(),
        }
    }

    fn config(backoff_ms: u64) -> CaptureConfig {
        CaptureConfig {
            frame_duration_secs: 0.01,
            native_sample_rate: 32_000,
            target_sample_rate: 16_000,
            reconnect_backoff_ms: backoff_ms,
            ..CaptureConfig::default()
        }
    }

    fn backend(
        catalogs: Vec<DeviceCatalog>,
        streams: Vec<ScriptedStream>,
    ) -> (ScriptedBackend, Arc<Mutex<Vec<String>>>) {
        let opened = Arc::new(Mutex::new(Vec::new()));
        let backend = ScriptedBackend {
            catalogs: Mutex::new(catalogs.into()),
            streams: streams.into(),
            opened: Arc::clone(&opened),
        };
        (backend, opened)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[test]
    fn open_without_devices_reports_no_device() {
        let (b, _) = backend(vec![DeviceCatalog::default()], vec![]);
        let result = CaptureSource::open(b, config(0));
        assert!(matches!(result, Err(CaptureError::NoDeviceAvailable)));
    }

    #[test]
    fn frames_are_resampled_to_target_rate() {
        let (b, _) = backend(vec![loopback_catalog()], vec![stream(vec![Ok(())])]);
        let mut source = CaptureSource::open(b, config(0)).unwrap();
        let cancel = AtomicBool::new(false);

        let frame = source.next_frame(&cancel).unwrap();
        assert_eq!(frame.sample_rate(), 16_000);
        assert_eq!(frame.channels(), 2);
        // 0.01 s @ 32 kHz = 320 native frames → 160 target frames.
        assert_eq!(frame.len(), 160);
        assert_eq!(frame.device_kind(), DeviceKind::Loopback);
        assert_eq!(source.state(), &CaptureState::Streaming);
    }

    #[test]
    fn invalidated_device_reacquires_without_backoff() {
        let (b, opened) = backend(
            vec![loopback_catalog()],
            vec![
                stream(vec![Err(CaptureError::DeviceInvalidated("gone".into()))]),
                stream(vec![Ok(())]),
            ],
        );
        let mut source = CaptureSource::open(b, config(5_000)).unwrap();
        let cancel = AtomicBool::new(false);

        let started = Instant::now();
        assert!(source.next_frame(&cancel).is_ok());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(opened.lock().unwrap().len(), 2);
    }

    #[test]
    fn transient_error_waits_backoff_then_reacquires() {
        let (b, opened) = backend(
            vec![loopback_catalog()],
            vec![
                stream(vec![Err(CaptureError::Transient("discontinuity".into()))]),
                stream(vec![Ok(())]),
            ],
        );
        let mut source = CaptureSource::open(b, config(60)).unwrap();
        let cancel = AtomicBool::new(false);

        let started = Instant::now();
        assert!(source.next_frame(&cancel).is_ok());
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(opened.lock().unwrap().len(), 2);
    }

    #[test]
    fn missing_device_keeps_retrying_until_it_returns() {
        let (b, opened) = backend(
            vec![
                loopback_catalog(),
                DeviceCatalog::default(),
                DeviceCatalog::default(),
                loopback_catalog(),
            ],
            vec![
                stream(vec![Err(CaptureError::DeviceInvalidated("unplugged".into()))]),
                stream(vec![Ok(())]),
            ],
        );
        let mut source = CaptureSource::open(b, config(1)).unwrap();
        let cancel = AtomicBool::new(false);

        assert!(source.next_frame(&cancel).is_ok());
        assert_eq!(opened.lock().unwrap().len(), 2);
        assert_eq!(source.state(), &CaptureState::Streaming);
    }

    #[test]
    fn lazy_source_waits_for_a_device() {
        let (b, opened) = backend(
            vec![DeviceCatalog::default(), loopback_catalog()],
            vec![stream(vec![Ok(())])],
        );
        let mut source = CaptureSource::new(b, config(1));
        assert_eq!(source.state(), &CaptureState::Disconnected);

        assert!(source.next_frame(&AtomicBool::new(false)).is_ok());
        assert_eq!(opened.lock().unwrap().len(), 1);
    }

    #[test]
    fn cancellation_ends_the_stream() {
        let (b, _) = backend(vec![loopback_catalog()], vec![stream(vec![Ok(())])]);
        let mut source = CaptureSource::open(b, config(0)).unwrap();
        let cancel = AtomicBool::new(true);

        assert_eq!(source.next_frame(&cancel).unwrap_err(), CaptureError::Cancelled);
        assert_eq!(source.state(), &CaptureState::Disconnected);
    }

    #[test]
    fn cancellation_interrupts_backoff() {
        let (b, _) = backend(
            vec![loopback_catalog()],
            vec![stream(vec![Err(CaptureError::Transient("x".into()))])],
        );
        let mut source = CaptureSource::open(b, config(60_000)).unwrap();
        let cancel = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&cancel);
        let setter = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::Relaxed);
        });

        let started = Instant::now();
        assert_eq!(source.next_frame(&cancel).unwrap_err(), CaptureError::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
        setter.join().unwrap();
    }

    #[test]
    fn observer_sees_transitions() {
        let (b, _) = backend(
            vec![loopback_catalog()],
            vec![
                stream(vec![Err(CaptureError::DeviceInvalidated("gone".into()))]),
                stream(vec![Ok(())]),
            ],
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut source = CaptureSource::open(b, config(0))
            .unwrap()
            .on_state_change(move |state, _| sink.lock().unwrap().push(state.label()));

        source.next_frame(&AtomicBool::new(false)).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            ["Streaming", "Error", "Connecting", "Streaming"]
        );
    }

    #[test]
    fn retry_policy_routes_errors() {
        let policy = RetryPolicy::new(Duration::from_millis(1_500));
        assert_eq!(
            policy.recovery(&CaptureError::DeviceInvalidated("x".into())),
            Recovery::Reacquire
        );
        assert_eq!(
            policy.recovery(&CaptureError::Transient("x".into())),
            Recovery::Backoff(Duration::from_millis(1_500))
        );
        assert_eq!(
            policy.recovery(&CaptureError::NoDeviceAvailable),
            Recovery::Backoff(Duration::from_millis(1_500))
        );
        assert_eq!(policy.recovery(&CaptureError::Cancelled), Recovery::Stop);
    }

    #[test]
    fn frame_len_uses_floor() {
        assert_eq!(frame_len(44_100, 1.0), 44_100);
        assert_eq!(frame_len(44_100, 0.7), 30_870);
        assert_eq!(frame_len(44_100, 0.25), 11_025);
        assert_eq!(frame_len(44_100, 0.0), 1);
    }

    #[test]
    fn frame_len_keeps_decimal_durations_whole() {
        assert_eq!(frame_len(32_000, 0.01), 320);
        assert_eq!(frame_len(48_000, 0.1), 4_800);
        assert_eq!(frame_len(44_100, 0.3), 13_230);
        assert_eq!(frame_len(44_100, 0.9), 39_690);
    }

    #[test]
    fn frame_len_still_floors_fractional_counts() {
        // 44_100 × 0.00001 = 0.441 → clamped to one sample.
        assert_eq!(frame_len(44_100, 0.000_01), 1);
        // 22_050 × 0.5001 = 11_027.205
        assert_eq!(frame_len(22_050, 0.500_1), 11_027);
    }

    /// Catalog always lists the device, but opening it keeps failing.
    struct UnopenableBackend {
        opens: Arc<AtomicUsize>,
    }

    impl AudioBackend for UnopenableBackend {
        type Stream = ScriptedStream;

        fn catalog(&self) -> Result<DeviceCatalog, CaptureError> {
            Ok(loopback_catalog())
        }

        fn open(
            &mut self,
            _device: &ResolvedDevice,
            _sample_rate: u32,
        ) -> Result<ScriptedStream, CaptureError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Err(CaptureError::DeviceInvalidated("device busy".into()))
        }
    }

    #[test]
    fn failed_reacquisition_waits_for_backoff() {
        let opens = Arc::new(AtomicUsize::new(0));
        let backend = UnopenableBackend {
            opens: Arc::clone(&opens),
        };
        let mut source = CaptureSource::new(backend, config(1_500));
        let cancel = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&cancel);
        let setter = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            flag.store(true, Ordering::Relaxed);
        });

        assert_eq!(source.next_frame(&cancel).unwrap_err(), CaptureError::Cancelled);
        setter.join().unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }
}
