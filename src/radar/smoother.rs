//! Exponential smoothing of raw detections across frames.
//!
//! [`TemporalSmoother`] keeps one [`TrackedEvent`] per label:
//!
//! * first sighting → initialised to the raw values, no smoothing;
//! * seen again     → `α·raw + (1−α)·prev` (angles interpolate along the
//!   shorter arc in Full mode);
//! * not seen       → evicted immediately.
//!
//! Switching between Semi and Full mode drops all state, because positions
//! from one coordinate system are meaningless in the other.

use std::collections::{HashMap, HashSet};

use super::aggregate::RawDetection;
use super::layout::RadarMode;

/// Wrap `degrees` into `(-180, 180]`.
///
/// ```
/// use sound_radar::radar::normalize_angle;
///
/// assert_eq!(normalize_angle(190.0), -170.0);
/// assert_eq!(normalize_angle(-180.0), 180.0);
/// assert_eq!(normalize_angle(540.0), 180.0);
/// ```
pub fn normalize_angle(degrees: f32) -> f32 {
    let mut a = degrees % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

/// Persistent smoothed state of one label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedEvent {
    /// Scalar position (Semi) or azimuth in degrees (Full).
    pub position: f32,
    pub distance: f32,
}

/// Smoothed output for one currently tracked label.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedEvent {
    pub label: String,
    pub position: f32,
    pub distance: f32,
}

pub struct TemporalSmoother {
    alpha: f32,
    mode: Option<RadarMode>,
    events: HashMap<String, TrackedEvent>,
}

impl TemporalSmoother {
    /// `alpha` is clamped into `(0, 1]`.
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: clamp_alpha(alpha),
            mode: None,
            events: HashMap::new(),
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = clamp_alpha(alpha);
    }

    /// Number of labels currently tracked.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&TrackedEvent> {
        self.events.get(label)
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.mode = None;
    }

    /// Fold one frame's raw detections into the state and return the
    /// smoothed events, sorted by label.
    pub fn update(&mut self, mode: RadarMode, detections: &[RawDetection]) -> Vec<SmoothedEvent> {
        if self.mode != Some(mode) {
            if !self.events.is_empty() {
                log::debug!("smoother: radar mode changed to {mode:?}, resetting");
            }
            self.events.clear();
            self.mode = Some(mode);
        }

        let alpha = self.alpha;
        let mut seen: HashSet<&str> = HashSet::with_capacity(detections.len());

        for raw in detections {
            seen.insert(raw.label.as_str());
            let (raw_position, raw_distance) = clamp_raw(mode, raw);

            match self.events.get_mut(&raw.label) {
                Some(event) => {
                    event.position = match mode {
                        RadarMode::Semi => {
                            lerp(event.position, raw_position, alpha).clamp(-1.0, 1.0)
                        }
                        RadarMode::Full => circular_lerp(event.position, raw_position, alpha),
                    };
                    event.distance = lerp(event.distance, raw_distance, alpha).clamp(0.0, 1.0);
                }
                None => {
                    self.events.insert(
                        raw.label.clone(),
                        TrackedEvent {
                            position: raw_position,
                            distance: raw_distance,
                        },
                    );
                }
            }
        }

        let before = self.events.len();
        self.events.retain(|label, _| seen.contains(label.as_str()));
        if self.events.len() < before {
            log::debug!("smoother: evicted {} stale label(s)", before - self.events.len());
        }

        let mut out: Vec<SmoothedEvent> = self
            .events
            .iter()
            .map(|(label, e)| SmoothedEvent {
                label: label.clone(),
                position: e.position,
                distance: e.distance,
            })
            .collect();
        out.sort_by(|a, b| a.label.cmp(&b.label));
        out
    }
}

fn clamp_alpha(alpha: f32) -> f32 {
    if alpha.is_nan() || alpha <= 0.0 {
        f32::EPSILON
    } else {
        alpha.min(1.0)
    }
}

fn clamp_raw(mode: RadarMode, raw: &RawDetection) -> (f32, f32) {
    let position = match mode {
        RadarMode::Semi => raw.position.clamp(-1.0, 1.0),
        RadarMode::Full => normalize_angle(raw.position),
    };
    (position, raw.distance.clamp(0.0, 1.0))
}

fn lerp(prev: f32, raw: f32, alpha: f32) -> f32 {
    alpha * raw + (1.0 - alpha) * prev
}

/// Move `prev` towards `raw` by `alpha` along the shorter arc.
fn circular_lerp(prev: f32, raw: f32, alpha: f32) -> f32 {
    let diff = normalize_angle(raw - prev);
    normalize_angle(prev + alpha * diff)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(label: &str, position: f32, distance: f32) -> RawDetection {
        RawDetection {
            label: label.to_string(),
            position,
            distance,
        }
    }

    #[test]
    fn normalize_angle_range() {
        for a in [-720.0, -540.0, -181.0, -180.0, -0.5, 0.0, 179.9, 180.0, 181.0, 359.0, 720.0] {
            let n = normalize_angle(a);
            assert!(n > -180.0 && n <= 180.0, "{a} → {n}");
        }
        assert_eq!(normalize_angle(-190.0), 170.0);
    }

    #[test]
    fn first_sighting_is_unsmoothed() {
        let mut s = TemporalSmoother::new(0.3);
        let out = s.update(RadarMode::Full, &[raw("Speech", 120.0, 0.6)]);
        assert_eq!(out[0].position, 120.0);
        assert_eq!(out[0].distance, 0.6);
    }

    #[test]
    fn wraps_across_180() {
        let mut s = TemporalSmoother::new(0.3);
        s.update(RadarMode::Full, &[raw("Car", 170.0, 0.5)]);
        let out = s.update(RadarMode::Full, &[raw("Car", -170.0, 0.5)]);
        assert!((out[0].position - 176.0).abs() < 1e-4, "{}", out[0].position);
    }

    #[test]
    fn wraps_the_other_way() {
        let mut s = TemporalSmoother::new(0.5);
        s.update(RadarMode::Full, &[raw("Car", -170.0, 0.5)]);
        let out = s.update(RadarMode::Full, &[raw("Car", 170.0, 0.5)]);
        // diff −20°, half way → −180° which normalizes to 180°.
        assert!((out[0].position - 180.0).abs() < 1e-4, "{}", out[0].position);
    }

    #[test]
    fn semi_position_is_linear() {
        let mut s = TemporalSmoother::new(0.3);
        s.update(RadarMode::Semi, &[raw("Speech", -1.0, 0.8)]);
        let out = s.update(RadarMode::Semi, &[raw("Speech", 1.0, 0.8)]);
        assert!((out[0].position - (-0.4)).abs() < 1e-6);
    }

    #[test]
    fn distance_is_smoothed() {
        let mut s = TemporalSmoother::new(0.3);
        s.update(RadarMode::Semi, &[raw("Dog", 0.0, 1.0)]);
        let out = s.update(RadarMode::Semi, &[raw("Dog", 0.0, 0.0)]);
        assert!((out[0].distance - 0.7).abs() < 1e-6);
    }

    #[test]
    fn absent_label_is_evicted_immediately() {
        let mut s = TemporalSmoother::new(0.3);
        s.update(RadarMode::Full, &[raw("Speech", 0.0, 0.5), raw("Music", 90.0, 0.4)]);
        let out = s.update(RadarMode::Full, &[raw("Music", 90.0, 0.4)]);

        assert!(s.get("Speech").is_none());
        assert_eq!(s.len(), 1);
        assert!(out.iter().all(|e| e.label != "Speech"));
    }

    #[test]
    fn empty_frame_clears_everything() {
        let mut s = TemporalSmoother::new(0.3);
        s.update(RadarMode::Semi, &[raw("Speech", 0.0, 0.5)]);
        assert!(s.update(RadarMode::Semi, &[]).is_empty());
        assert!(s.is_empty());
    }

    #[test]
    fn reappearing_label_starts_fresh() {
        let mut s = TemporalSmoother::new(0.3);
        s.update(RadarMode::Full, &[raw("Dog", 0.0, 0.5)]);
        s.update(RadarMode::Full, &[]);
        let out = s.update(RadarMode::Full, &[raw("Dog", 90.0, 0.9)]);
        assert_eq!(out[0].position, 90.0);
        assert_eq!(out[0].distance, 0.9);
    }

    #[test]
    fn mode_change_resets_state() {
        let mut s = TemporalSmoother::new(0.3);
        s.update(RadarMode::Semi, &[raw("Speech", 0.5, 0.5)]);
        let out = s.update(RadarMode::Full, &[raw("Speech", 90.0, 0.5)]);
        assert_eq!(out[0].position, 90.0);
    }

    #[test]
    fn converges_monotonically_under_identical_input() {
        let mut s = TemporalSmoother::new(0.3);
        s.update(RadarMode::Full, &[raw("Siren", -150.0, 0.2)]);

        let target = raw("Siren", 160.0, 0.9);
        let mut prev_gap = f32::MAX;
        let mut prev_dist_gap = f32::MAX;
        for _ in 0..20 {
            let out = s.update(RadarMode::Full, std::slice::from_ref(&target));
            let gap = normalize_angle(target.position - out[0].position).abs();
            let dist_gap = (target.distance - out[0].distance).abs();
            assert!(gap <= prev_gap + 1e-4, "{gap} > {prev_gap}");
            assert!(dist_gap <= prev_dist_gap + 1e-6);
            assert!(out[0].position > -180.0 && out[0].position <= 180.0);
            prev_gap = gap;
            prev_dist_gap = dist_gap;
        }
        assert!(prev_gap < 1.0);
    }

    #[test]
    fn output_is_sorted_and_clamped() {
        let mut s = TemporalSmoother::new(0.3);
        let out = s.update(
            RadarMode::Semi,
            &[raw("Zebra", 3.0, 2.0), raw("Alarm", -3.0, -1.0)],
        );
        assert_eq!(out[0].label, "Alarm");
        assert_eq!(out[0].position, -1.0);
        assert_eq!(out[0].distance, 0.0);
        assert_eq!(out[1].position, 1.0);
        assert_eq!(out[1].distance, 1.0);
    }

    #[test]
    fn alpha_is_kept_in_range() {
        assert_eq!(TemporalSmoother::new(2.0).alpha(), 1.0);
        assert!(TemporalSmoother::new(0.0).alpha() > 0.0);
    }
}
