//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and snapshotted once per
//! processed frame.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::paths;
use crate::radar::ChannelLayout;

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Settings for loopback acquisition and resampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture device name; `None` means the loopback counterpart of the
    /// default output device.
    pub device: Option<String>,
    /// Duration of one analysed frame in seconds (must be > 0).
    pub frame_duration_secs: f32,
    /// Rate requested from the device.  Loopback backends usually refuse
    /// arbitrary rates, so this stays at a common hardware rate.
    pub native_sample_rate: u32,
    /// Rate every frame is resampled to before classification.
    pub target_sample_rate: u32,
    /// Wait between re-acquisition attempts after a transient failure.
    pub reconnect_backoff_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            frame_duration_secs: 1.0,
            native_sample_rate: 44_100,
            target_sample_rate: 16_000,
            reconnect_backoff_ms: 1_500,
        }
    }
}

// ---------------------------------------------------------------------------
// ClassifierConfig
// ---------------------------------------------------------------------------

/// Settings for the external sound classification service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Base URL of the classification service.
    pub base_url: String,
    /// Model identifier forwarded to the service.
    pub model: String,
    /// Number of ranked labels requested per channel.
    pub top_k: usize,
    /// Candidates at or below this confidence are discarded.
    pub confidence_threshold: f32,
    /// Maximum seconds to wait for one classification response.
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8765".into(),
            model: "mit/ast-finetuned-audioset-10-10-0.4593".into(),
            top_k: 3,
            confidence_threshold: 0.2,
            timeout_secs: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessingConfig
// ---------------------------------------------------------------------------

/// Frame pre-processing applied before classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Apply a Hamming taper to every channel.
    pub apply_hamming: bool,
    /// Peak-normalize the frame before classification.
    pub normalize_audio: bool,
    /// RMS below which a frame is skipped; also the peak floor under which
    /// normalization is not applied.
    pub silence_threshold: f32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            apply_hamming: false,
            normalize_audio: false,
            silence_threshold: 0.01,
        }
    }
}

// ---------------------------------------------------------------------------
// RadarConfig
// ---------------------------------------------------------------------------

/// Spatial tracking and output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    /// Track and emit smoothed radar dots.
    pub enabled: bool,
    /// Loudspeaker layout used to map channels to azimuths.
    pub channel_layout: ChannelLayout,
    /// Exponential smoothing factor α in `(0, 1]`.
    pub smoothing_factor: f32,
    /// Emit per-channel RMS level bars.
    pub show_channel_levels: bool,
    /// Emit a one-line diagnostics string.
    pub show_debug: bool,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_layout: ChannelLayout::default(),
            smoothing_factor: 0.3,
            show_channel_levels: false,
            show_debug: false,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use sound_radar::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Device and resampling settings.
    pub capture: CaptureConfig,
    /// Classification service settings.
    pub classifier: ClassifierConfig,
    /// Window / normalization settings.
    pub processing: ProcessingConfig,
    /// Radar tracking and output settings.
    pub radar: RadarConfig,
}

impl AppConfig {
    /// Load configuration from the resolved `settings.toml`
    /// (see [`paths::settings_file`]).
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::settings_file())
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&paths::settings_file())
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let capture = &self.capture;
        if !(capture.frame_duration_secs > 0.0) {
            bail!(
                "capture.frame_duration_secs must be > 0 (got {})",
                capture.frame_duration_secs
            );
        }
        if capture.native_sample_rate == 0 || capture.target_sample_rate == 0 {
            bail!("capture sample rates must be non-zero");
        }

        let classifier = &self.classifier;
        if classifier.top_k == 0 {
            bail!("classifier.top_k must be at least 1");
        }
        if !(0.0..=1.0).contains(&classifier.confidence_threshold) {
            bail!(
                "classifier.confidence_threshold must be within [0, 1] (got {})",
                classifier.confidence_threshold
            );
        }

        if !(self.processing.silence_threshold >= 0.0) {
            bail!("processing.silence_threshold must be >= 0");
        }

        let alpha = self.radar.smoothing_factor;
        if !(alpha > 0.0 && alpha <= 1.0) {
            bail!("radar.smoothing_factor must be within (0, 1] (got {alpha})");
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
