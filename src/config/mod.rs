//! Configuration module for Sound Radar.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each pipeline
//! stage, settings file resolution (`SOUND_RADAR_CONFIG` or the platform
//! config directory), and TOML persistence via `AppConfig::load` /
//! `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::{settings_file, CONFIG_ENV};
pub use settings::{AppConfig, CaptureConfig, ClassifierConfig, ProcessingConfig, RadarConfig};
