//! Capture device resolution and the backend abstraction.
//!
//! Resolution order:
//!
//! 1. Requested device hint, matched by exact name.
//! 2. Loopback counterpart of the default output device: exact name match
//!    among capture devices, then substring match (e.g. PulseAudio's
//!    `"Monitor of <sink>"`).
//! 3. The output device itself, on backends that capture output endpoints
//!    in loopback mode.
//! 4. The default capture device, usually a microphone.
//!
//! [`resolve_device`] is a pure function over a [`DeviceCatalog`] snapshot
//! so the rules can be tested without audio hardware.

use std::sync::atomic::AtomicBool;

use serde::Serialize;

use super::capture::CaptureError;

// ---------------------------------------------------------------------------
// DeviceKind / Endpoint
// ---------------------------------------------------------------------------

/// How a device was selected; reported in debug output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceKind {
    /// Matched the configured device hint.
    Requested,
    /// Loopback of the default output device.
    Loopback,
    /// Fell back to the default capture device.
    Microphone,
}

impl DeviceKind {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::Requested => "Selected",
            DeviceKind::Loopback => "Loopback",
            DeviceKind::Microphone => "Microphone",
        }
    }
}

/// Which side of the audio host a resolved device lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Input,
    /// An output device opened for capture (WASAPI-style loopback).
    Output,
}

// ---------------------------------------------------------------------------
// ResolvedDevice / DeviceCatalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub name: String,
    pub kind: DeviceKind,
    pub endpoint: Endpoint,
}

/// Snapshot of the devices an audio host currently exposes.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    /// Names of every capture device, loopback monitors included.
    pub input_devices: Vec<String>,
    pub default_output: Option<String>,
    pub default_input: Option<String>,
    /// The host can capture an output device directly.
    pub output_loopback: bool,
}

/// Apply the resolution rules to `catalog`.
///
/// # Errors
///
/// [`CaptureError::NoDeviceAvailable`] when no rule matches.
pub fn resolve_device(
    hint: Option<&str>,
    catalog: &DeviceCatalog,
) -> Result<ResolvedDevice, CaptureError> {
    let input = |name: &str, kind| ResolvedDevice {
        name: name.to_string(),
        kind,
        endpoint: Endpoint::Input,
    };

    if let Some(hint) = hint {
        if let Some(name) = catalog.input_devices.iter().find(|n| n.as_str() == hint) {
            return Ok(input(name, DeviceKind::Requested));
        }
        log::warn!("capture: requested device {hint:?} not found, falling back to loopback");
    }

    if let Some(output) = catalog.default_output.as_deref() {
        let exact = catalog.input_devices.iter().find(|n| n.as_str() == output);
        let partial = || {
            catalog
                .input_devices
                .iter()
                .find(|n| n.contains(output))
        };
        if let Some(name) = exact.or_else(partial) {
            return Ok(input(name, DeviceKind::Loopback));
        }
        if catalog.output_loopback {
            return Ok(ResolvedDevice {
                name: output.to_string(),
                kind: DeviceKind::Loopback,
                endpoint: Endpoint::Output,
            });
        }
        log::warn!("capture: no loopback device found for output {output:?}");
    }

    if let Some(name) = catalog.default_input.as_deref() {
        log::warn!("capture: falling back to default capture device {name:?}");
        return Ok(input(name, DeviceKind::Microphone));
    }

    Err(CaptureError::NoDeviceAvailable)
}

// ---------------------------------------------------------------------------
// Backend traits
// ---------------------------------------------------------------------------

/// An open capture stream.
pub trait InputStream {
    fn channels(&self) -> u16;

    /// Rate the device was actually opened at.
    fn sample_rate(&self) -> u32;

    /// Block until `frames` interleaved frames are available.
    ///
    /// Returns [`CaptureError::Cancelled`] promptly once `cancel` is set.
    fn read(&mut self, frames: usize, cancel: &AtomicBool) -> Result<Vec<f32>, CaptureError>;
}

/// An audio host able to enumerate and open capture devices.
pub trait AudioBackend {
    type Stream: InputStream;

    fn catalog(&self) -> Result<DeviceCatalog, CaptureError>;

    /// Open `device`, requesting `sample_rate`.  Implementations may fall
    /// back to the device's own rate; callers read it from the stream.
    fn open(&mut self, device: &ResolvedDevice, sample_rate: u32)
        -> Result<Self::Stream, CaptureError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(inputs: &[&str], output: Option<&str>, input: Option<&str>) -> DeviceCatalog {
        DeviceCatalog {
            input_devices: inputs.iter().map(|s| s.to_string()).collect(),
            default_output: output.map(String::from),
            default_input: input.map(String::from),
            output_loopback: false,
        }
    }

    #[test]
    fn hint_matches_exact_name() {
        let cat = catalog(&["Mic", "Line In"], Some("Speakers"), Some("Mic"));
        let dev = resolve_device(Some("Line In"), &cat).unwrap();
        assert_eq!(dev.name, "Line In");
        assert_eq!(dev.kind, DeviceKind::Requested);
    }

    #[test]
    fn hint_is_not_substring_matched() {
        let cat = catalog(&["Line In 2"], None, Some("Line In 2"));
        let dev = resolve_device(Some("Line In"), &cat).unwrap();
        assert_eq!(dev.kind, DeviceKind::Microphone);
    }

    #[test]
    fn loopback_exact_name_preferred_over_substring() {
        let cat = catalog(
            &["Monitor of Speakers", "Speakers"],
            Some("Speakers"),
            Some("Mic"),
        );
        let dev = resolve_device(None, &cat).unwrap();
        assert_eq!(dev.name, "Speakers");
        assert_eq!(dev.kind, DeviceKind::Loopback);
    }

    #[test]
    fn loopback_substring_match() {
        let cat = catalog(&["Mic", "Monitor of Speakers"], Some("Speakers"), Some("Mic"));
        let dev = resolve_device(None, &cat).unwrap();
        assert_eq!(dev.name, "Monitor of Speakers");
        assert_eq!(dev.kind, DeviceKind::Loopback);
        assert_eq!(dev.endpoint, Endpoint::Input);
    }

    #[test]
    fn output_endpoint_used_when_host_supports_it() {
        let mut cat = catalog(&["Mic"], Some("Speakers"), Some("Mic"));
        cat.output_loopback = true;
        let dev = resolve_device(None, &cat).unwrap();
        assert_eq!(dev.name, "Speakers");
        assert_eq!(dev.endpoint, Endpoint::Output);
    }

    #[test]
    fn falls_back_to_default_capture_device() {
        let cat = catalog(&["Mic"], Some("Speakers"), Some("Mic"));
        let dev = resolve_device(None, &cat).unwrap();
        assert_eq!(dev.name, "Mic");
        assert_eq!(dev.kind, DeviceKind::Microphone);
    }

    #[test]
    fn nothing_resolves_to_no_device() {
        let cat = catalog(&[], None, None);
        assert_eq!(
            resolve_device(None, &cat),
            Err(CaptureError::NoDeviceAvailable)
        );
    }
}
