//! Per-frame aggregation of channel classifications into raw detections.
//!
//! ```text
//! AudioFrame ──▶ for each mapped channel ──▶ ClassificationAdapter
//!                          │                        │
//!                          ▼                        ▼
//!                    channel RMS          filter (threshold, Silence)
//!                                                   │
//!                     ┌─────────────────────────────┴──────────┐
//!                     ▼ Semi (≤ 2 ch)                          ▼ Full (> 2 ch)
//!        position = (r − l) / (r + l)            Σ conf · (sin θ, cos θ)
//!        distance = max(l, r)                    angle = 90° − atan2(y, x)
//!                                                distance = max channel conf
//! ```
//!
//! Channels are classified one after another; results are combined only
//! once every channel of the frame has been collected.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::audio::{rms, AudioFrame};
use crate::classify::{ClassificationAdapter, Prediction};

use super::layout::{ChannelMap, RadarMode};
use super::smoother::normalize_angle;

/// Label the classifier uses for "nothing audible".
pub const SILENCE_LABEL: &str = "Silence";

/// Vectors shorter than this count as exact cancellation.
const MIN_MAGNITUDE: f32 = 1e-6;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One label's unsmoothed position for the current frame.
///
/// `position` is a scalar in `[-1, 1]` in Semi mode and an azimuth in
/// `(-180°, 180°]` in Full mode.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub label: String,
    pub position: f32,
    pub distance: f32,
}

/// Accepted predictions and level of one mapped channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelResult {
    pub channel: usize,
    pub angle: f32,
    pub rms: f32,
    pub predictions: Vec<Prediction>,
    pub latency: Duration,
}

/// Everything the aggregator learned from one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub mode: RadarMode,
    pub channels: Vec<ChannelResult>,
    /// Sorted by label.
    pub detections: Vec<RawDetection>,
}

impl Aggregation {
    /// Sum of classification latency across channels.
    pub fn total_latency(&self) -> Duration {
        self.channels.iter().map(|c| c.latency).sum()
    }

    /// Mean classification latency per classified channel.
    pub fn average_latency(&self) -> Duration {
        match self.channels.len() {
            0 => Duration::ZERO,
            n => self.total_latency() / n as u32,
        }
    }

    /// Semi-mode left channel predictions (channel 0).
    pub fn left(&self) -> &[Prediction] {
        side_of(&self.channels, 0)
    }

    /// Semi-mode right channel predictions (channel 1).
    pub fn right(&self) -> &[Prediction] {
        side_of(&self.channels, 1)
    }
}

// ---------------------------------------------------------------------------
// VectorAggregator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct VectorAggregator {
    pub confidence_threshold: f32,
    pub top_k: usize,
}

impl VectorAggregator {
    pub fn new(confidence_threshold: f32, top_k: usize) -> Self {
        Self {
            confidence_threshold,
            top_k,
        }
    }

    /// `true` when a prediction takes part in aggregation.
    pub fn accepts(&self, prediction: &Prediction) -> bool {
        prediction.confidence > self.confidence_threshold && prediction.label != SILENCE_LABEL
    }

    /// Classify every mapped channel of `frame` and aggregate the results.
    pub async fn aggregate(
        &self,
        frame: &AudioFrame,
        map: &ChannelMap,
        classifier: &ClassificationAdapter,
    ) -> Aggregation {
        let mode = RadarMode::for_channels(frame.channels());
        let mut channels = Vec::with_capacity(map.len());

        for (channel, angle) in map.iter() {
            let waveform = frame.channel(channel);
            if waveform.is_empty() {
                continue;
            }

            let result = classifier.classify(&waveform, self.top_k).await;
            let predictions: Vec<Prediction> = result
                .predictions
                .into_iter()
                .filter(|p| self.accepts(p))
                .collect();

            log::debug!(
                "aggregate: ch{channel} @ {angle:+.0}° → {} accepted in {:?}",
                predictions.len(),
                result.latency
            );

            channels.push(ChannelResult {
                channel,
                angle,
                rms: rms(&waveform),
                predictions,
                latency: result.latency,
            });
        }

        let detections = match mode {
            RadarMode::Semi => {
                let left = side_of(&channels, 0);
                let right = side_of(&channels, 1);
                aggregate_semi(left, right)
            }
            RadarMode::Full => aggregate_full(&channels),
        };

        Aggregation {
            mode,
            channels,
            detections,
        }
    }
}

fn side_of(channels: &[ChannelResult], index: usize) -> &[Prediction] {
    channels
        .iter()
        .find(|c| c.channel == index)
        .map(|c| c.predictions.as_slice())
        .unwrap_or(&[])
}

// ---------------------------------------------------------------------------
// Mode-specific aggregation
// ---------------------------------------------------------------------------

/// Stereo balance per label.
///
/// A label listed twice on one side keeps its best score.
pub fn aggregate_semi(left: &[Prediction], right: &[Prediction]) -> Vec<RawDetection> {
    let mut scores: BTreeMap<&str, (f32, f32)> = BTreeMap::new();
    for p in left {
        let entry = scores.entry(p.label.as_str()).or_default();
        entry.0 = entry.0.max(p.confidence);
    }
    for p in right {
        let entry = scores.entry(p.label.as_str()).or_default();
        entry.1 = entry.1.max(p.confidence);
    }

    scores
        .into_iter()
        .map(|(label, (l, r))| {
            let sum = l + r;
            let position = if sum > 0.0 { (r - l) / sum } else { 0.0 };
            RawDetection {
                label: label.to_string(),
                position: position.clamp(-1.0, 1.0),
                distance: l.max(r).clamp(0.0, 1.0),
            }
        })
        .collect()
}

#[derive(Default)]
struct DirectionVector {
    x: f32,
    y: f32,
    max_confidence: f32,
}

/// Confidence-weighted direction sum per label.
pub fn aggregate_full(channels: &[ChannelResult]) -> Vec<RawDetection> {
    let mut vectors: BTreeMap<&str, DirectionVector> = BTreeMap::new();

    for channel in channels {
        let theta = channel.angle.to_radians();
        for p in &channel.predictions {
            let v = vectors.entry(p.label.as_str()).or_default();
            v.x += p.confidence * theta.sin();
            v.y += p.confidence * theta.cos();
            v.max_confidence = v.max_confidence.max(p.confidence);
        }
    }

    vectors
        .into_iter()
        .filter_map(|(label, v)| {
            if v.x.hypot(v.y) < MIN_MAGNITUDE {
                log::debug!("aggregate: {label} cancels out, no direction");
                return None;
            }
            let angle = 90.0 - v.y.atan2(v.x).to_degrees();
            Some(RawDetection {
                label: label.to_string(),
                position: normalize_angle(angle),
                distance: v.max_confidence.clamp(0.0, 1.0),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
