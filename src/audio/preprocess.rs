//! Frame pre-processing ahead of classification.
//!
//! [`Preprocessor`] applies the optional Hamming taper and peak
//! normalization, then gates the frame on overall RMS:
//!
//! | Step          | Applied when                                     |
//! |---------------|--------------------------------------------------|
//! | Hamming       | `apply_hamming` is set (per channel, along time) |
//! | Normalization | `normalize` is set and peak > silence threshold  |
//! | Silence gate  | always; frames with RMS < threshold are dropped  |
//!
//! Normalization uses one gain for the whole frame so the relative levels
//! between channels are kept.

use super::frame::AudioFrame;
use crate::config::ProcessingConfig;

// ---------------------------------------------------------------------------
// Level helpers
// ---------------------------------------------------------------------------

/// Root-mean-square of `samples`; `0.0` for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_sq = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_sq.sqrt()
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Symmetric Hamming window of length `len`.
///
/// ```
/// use sound_radar::audio::hamming_window;
///
/// let w = hamming_window(5);
/// assert!((w[0] - 0.08).abs() < 1e-6);
/// assert!((w[2] - 1.0).abs() < 1e-6);
/// ```
pub fn hamming_window(len: usize) -> Vec<f32> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        n => {
            let denom = (n - 1) as f32;
            (0..n)
                .map(|i| 0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Preprocessor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Preprocessor {
    pub apply_hamming: bool,
    pub normalize: bool,
    pub silence_threshold: f32,
}

impl Preprocessor {
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            apply_hamming: config.apply_hamming,
            normalize: config.normalize_audio,
            silence_threshold: config.silence_threshold,
        }
    }

    /// Returns the processed frame, or `None` when it is below the RMS
    /// silence threshold.
    pub fn process(&self, frame: AudioFrame) -> Option<AudioFrame> {
        let channels = frame.channels();
        let sample_rate = frame.sample_rate();
        let kind = frame.device_kind();
        let n = channels as usize;
        let len = frame.len();
        let mut samples = frame.into_samples();

        if self.apply_hamming && n > 0 {
            let window = hamming_window(len);
            for (chunk, w) in samples.chunks_exact_mut(n).zip(window.iter()) {
                for s in chunk.iter_mut() {
                    *s *= w;
                }
            }
        }

        if self.normalize {
            let p = peak(&samples);
            if p > self.silence_threshold {
                let gain = 1.0 / p;
                for s in samples.iter_mut() {
                    *s *= gain;
                }
            }
        }

        let level = rms(&samples);
        if level < self.silence_threshold {
            log::debug!(
                "preprocess: frame below silence threshold (rms {level:.4} < {:.4})",
                self.silence_threshold
            );
            return None;
        }

        Some(AudioFrame::new(samples, channels, sample_rate, kind))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
