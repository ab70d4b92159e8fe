//! Infallible wrapper around any [`SoundClassifier`].
//!
//! One bad channel must never abort a frame, so [`ClassificationAdapter`]
//! turns every failure into an empty prediction list with zero latency.
//! It also normalises successful results: confidences are clamped to
//! `[0, 1]`, the list is sorted best-first and truncated to `top_k`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::classifier::{Prediction, SoundClassifier};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Ranked predictions for one waveform plus the time the call took.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub predictions: Vec<Prediction>,
    pub latency: Duration,
}

// ---------------------------------------------------------------------------
// ClassificationAdapter
// ---------------------------------------------------------------------------

/// Cheap to clone; the wrapped classifier is shared.
#[derive(Clone)]
pub struct ClassificationAdapter {
    inner: Arc<dyn SoundClassifier>,
}

impl ClassificationAdapter {
    pub fn new(inner: Arc<dyn SoundClassifier>) -> Self {
        Self { inner }
    }

    /// Classify `waveform`; never returns an error.
    pub async fn classify(&self, waveform: &[f32], top_k: usize) -> Classification {
        let started = Instant::now();

        match self.inner.classify(waveform, top_k).await {
            Ok(mut predictions) => {
                let latency = started.elapsed();
                for p in predictions.iter_mut() {
                    p.confidence = if p.confidence.is_nan() {
                        0.0
                    } else {
                        p.confidence.clamp(0.0, 1.0)
                    };
                }
                predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
                predictions.truncate(top_k);
                Classification {
                    predictions,
                    latency,
                }
            }
            Err(err) => {
                log::warn!(
                    "classification failed, treating channel as silent ({} samples): {err}",
                    waveform.len()
                );
                Classification::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
