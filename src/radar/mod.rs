//! Spatial tracking: channel layout → aggregation → smoothing → output.
//!
//! ```text
//! ChannelMap::build(channels, layout)
//!         │
//! AudioFrame ─▶ VectorAggregator ─▶ TemporalSmoother ─▶ FrameEmitter ─▶ FrameOutput
//!                (raw detections)     (tracked events)    (dots, text, levels)
//! ```

pub mod aggregate;
pub mod frame;
pub mod layout;
pub mod smoother;

pub use aggregate::{
    aggregate_full, aggregate_semi, Aggregation, ChannelResult, RawDetection, VectorAggregator,
    SILENCE_LABEL,
};
pub use frame::{ChannelLevel, FrameEmitter, FrameOutput, RadarDot};
pub use layout::{ChannelLayout, ChannelMap, RadarMode};
pub use smoother::{normalize_angle, SmoothedEvent, TemporalSmoother, TrackedEvent};
