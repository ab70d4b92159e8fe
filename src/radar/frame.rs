//! Packaging of one processed frame for the presentation layer.

use serde::Serialize;

use super::aggregate::Aggregation;
use super::layout::RadarMode;
use super::smoother::SmoothedEvent;
use crate::audio::DeviceKind;
use crate::classify::Prediction;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One point on the radar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarDot {
    /// `[-1, 1]` in Semi mode, degrees in `(-180, 180]` in Full mode.
    pub position: f32,
    /// Smoothed, `[0, 1]`.
    pub distance: f32,
    pub label: String,
    /// Unsmoothed best confidence this frame, `[0, 1]`.
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelLevel {
    pub angle: f32,
    pub rms: f32,
}

/// Immutable record handed to the presentation layer, one per frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameOutput {
    pub mode: RadarMode,
    pub left_text: String,
    pub right_text: String,
    pub dots: Vec<RadarDot>,
    pub channel_levels: Vec<ChannelLevel>,
    pub debug_info: Option<String>,
}

impl FrameOutput {
    pub fn is_empty(&self) -> bool {
        self.left_text.is_empty()
            && self.right_text.is_empty()
            && self.dots.is_empty()
            && self.channel_levels.is_empty()
            && self.debug_info.is_none()
    }
}

// ---------------------------------------------------------------------------
// FrameEmitter
// ---------------------------------------------------------------------------

/// Display toggles read from the per-frame configuration snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEmitter {
    pub radar_enabled: bool,
    pub show_channel_levels: bool,
    pub show_debug: bool,
}

impl FrameEmitter {
    /// Build the output record, or `None` when every field would be empty.
    pub fn emit(
        &self,
        aggregation: &Aggregation,
        smoothed: &[SmoothedEvent],
        device_kind: DeviceKind,
        channel_count: u16,
    ) -> Option<FrameOutput> {
        let (left_text, right_text) = match aggregation.mode {
            RadarMode::Semi => (
                side_text(aggregation.left(), |l| format!("< {l}")),
                side_text(aggregation.right(), |l| format!("{l} >")),
            ),
            RadarMode::Full => (String::new(), String::new()),
        };

        let dots = if self.radar_enabled {
            smoothed
                .iter()
                .map(|e| RadarDot {
                    position: e.position,
                    distance: e.distance.clamp(0.0, 1.0),
                    label: e.label.clone(),
                    confidence: raw_confidence(aggregation, &e.label),
                })
                .collect()
        } else {
            Vec::new()
        };

        let channel_levels = if self.show_channel_levels {
            aggregation
                .channels
                .iter()
                .map(|c| ChannelLevel {
                    angle: c.angle,
                    rms: c.rms.clamp(0.0, 1.0),
                })
                .collect()
        } else {
            Vec::new()
        };

        let debug_info = self.show_debug.then(|| {
            format!(
                "Device: {} | Channels: {} | Latency: {:.1} ms/ch",
                device_kind.label(),
                channel_count,
                aggregation.average_latency().as_secs_f64() * 1_000.0
            )
        });

        let output = FrameOutput {
            mode: aggregation.mode,
            left_text,
            right_text,
            dots,
            channel_levels,
            debug_info,
        };

        (!output.is_empty()).then_some(output)
    }
}

/// One `"Label (0.80)"` line per prediction, decorated by `arrow`.
fn side_text(predictions: &[Prediction], arrow: impl Fn(&str) -> String) -> String {
    predictions
        .iter()
        .map(|p| arrow(&format!("{} ({:.2})", p.label, p.confidence)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn raw_confidence(aggregation: &Aggregation, label: &str) -> f32 {
    aggregation
        .detections
        .iter()
        .find(|d| d.label == label)
        .map(|d| d.distance.clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radar::aggregate::{ChannelResult, RawDetection};
    use std::time::Duration;

    fn channel(index: usize, angle: f32, predictions: Vec<Prediction>) -> ChannelResult {
        ChannelResult {
            channel: index,
            angle,
            rms: 0.25,
            predictions,
            latency: Duration::from_millis(40),
        }
    }

    fn semi() -> Aggregation {
        Aggregation {
            mode: RadarMode::Semi,
            channels: vec![
                channel(
                    0,
                    -45.0,
                    vec![Prediction::new("Speech", 0.8), Prediction::new("Music", 0.3)],
                ),
                channel(1, 45.0, vec![]),
            ],
            detections: vec![
                RawDetection {
                    label: "Music".into(),
                    position: -1.0,
                    distance: 0.3,
                },
                RawDetection {
                    label: "Speech".into(),
                    position: -1.0,
                    distance: 0.8,
                },
            ],
        }
    }

    fn smoothed() -> Vec<SmoothedEvent> {
        vec![SmoothedEvent {
            label: "Speech".into(),
            position: -0.9,
            distance: 0.7,
        }]
    }

    #[test]
    fn semi_text_lines() {
        let out = FrameEmitter::default()
            .emit(&semi(), &[], DeviceKind::Loopback, 2)
            .expect("text present");
        assert_eq!(out.left_text, "< Speech (0.80)\n< Music (0.30)");
        assert_eq!(out.right_text, "");
        assert!(out.dots.is_empty());
    }

    #[test]
    fn right_text_arrow_trails() {
        let mut agg = semi();
        agg.channels[1].predictions = vec![Prediction::new("Dog", 0.55)];
        let out = FrameEmitter::default()
            .emit(&agg, &[], DeviceKind::Loopback, 2)
            .unwrap();
        assert_eq!(out.right_text, "Dog (0.55) >");
    }

    #[test]
    fn dots_carry_smoothed_distance_and_raw_confidence() {
        let emitter = FrameEmitter {
            radar_enabled: true,
            ..FrameEmitter::default()
        };
        let out = emitter
            .emit(&semi(), &smoothed(), DeviceKind::Loopback, 2)
            .unwrap();
        assert_eq!(out.dots.len(), 1);
        assert_eq!(out.dots[0].distance, 0.7);
        assert_eq!(out.dots[0].confidence, 0.8);
        assert_eq!(out.dots[0].position, -0.9);
    }

    #[test]
    fn full_mode_has_no_side_text() {
        let agg = Aggregation {
            mode: RadarMode::Full,
            channels: vec![channel(2, 0.0, vec![Prediction::new("Car", 0.9)])],
            detections: vec![],
        };
        assert!(FrameEmitter::default()
            .emit(&agg, &[], DeviceKind::Loopback, 6)
            .is_none());
    }

    #[test]
    fn channel_levels_pair_rms_with_angle() {
        let emitter = FrameEmitter {
            show_channel_levels: true,
            ..FrameEmitter::default()
        };
        let out = emitter.emit(&semi(), &[], DeviceKind::Loopback, 2).unwrap();
        assert_eq!(
            out.channel_levels,
            vec![
                ChannelLevel {
                    angle: -45.0,
                    rms: 0.25
                },
                ChannelLevel {
                    angle: 45.0,
                    rms: 0.25
                },
            ]
        );
    }

    #[test]
    fn debug_line_reports_average_latency() {
        let emitter = FrameEmitter {
            show_debug: true,
            ..FrameEmitter::default()
        };
        let out = emitter.emit(&semi(), &[], DeviceKind::Microphone, 2).unwrap();
        assert_eq!(
            out.debug_info.as_deref(),
            Some("Device: Microphone | Channels: 2 | Latency: 40.0 ms/ch")
        );
    }

    #[test]
    fn all_empty_emits_nothing() {
        let agg = Aggregation {
            mode: RadarMode::Semi,
            channels: vec![channel(0, -45.0, vec![]), channel(1, 45.0, vec![])],
            detections: vec![],
        };
        let emitter = FrameEmitter {
            radar_enabled: true,
            ..FrameEmitter::default()
        };
        assert!(emitter.emit(&agg, &[], DeviceKind::Loopback, 2).is_none());
    }

    #[test]
    fn serializes_to_json() {
        let emitter = FrameEmitter {
            radar_enabled: true,
            ..FrameEmitter::default()
        };
        let out = emitter
            .emit(&semi(), &smoothed(), DeviceKind::Loopback, 2)
            .unwrap();
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["mode"], "semi");
        assert_eq!(json["dots"][0]["label"], "Speech");
        assert!(json["debug_info"].is_null());
    }
}
