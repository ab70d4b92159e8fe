//! Where `settings.toml` lives.
//!
//! `SOUND_RADAR_CONFIG` names the file directly when set (handy for running
//! several radars with different layouts side by side).  Otherwise the file
//! sits in the platform config directory reported by `dirs`:
//!
//! ```text
//! Windows: %APPDATA%\sound-radar\settings.toml
//! macOS:   ~/Library/Application Support/sound-radar/settings.toml
//! Linux:   ~/.config/sound-radar/settings.toml
//! ```

use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "SOUND_RADAR_CONFIG";

const APP_DIR: &str = "sound-radar";
const SETTINGS_FILE: &str = "settings.toml";

/// Resolved location of the settings file for this process.
pub fn settings_file() -> PathBuf {
    resolve_settings_file(std::env::var_os(CONFIG_ENV), dirs::config_dir())
}

/// An empty override counts as unset; a missing platform directory falls
/// back to the working directory.
fn resolve_settings_file(env_override: Option<OsString>, config_dir: Option<PathBuf>) -> PathBuf {
    match env_override {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_dir
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(SETTINGS_FILE),
    }
}
