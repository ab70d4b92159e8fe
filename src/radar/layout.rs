//! Channel → azimuth lookup tables for the supported loudspeaker layouts.
//!
//! Angles are in degrees, `0` = front, positive = right, circular.  A
//! channel that has no entry in the active table (e.g. LFE) takes no part in
//! spatial aggregation at all; it is never mapped to `0°`.
//!
//! The map is a pure function of `(channel count, layout)` and is rebuilt
//! for every frame, so a layout change can never be served from a stale
//! table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ChannelLayout
// ---------------------------------------------------------------------------

/// Loudspeaker layout presets.
///
/// | Variant               | Indices 2–7 (after the FL/FR pair)              |
/// |-----------------------|-------------------------------------------------|
/// | `Stereo`              | unmapped                                        |
/// | `Standard5_1Plus`     | C, LFE, BL, BR, SL, SR                          |
/// | `AlternativeCLfeLast` | BL, BR, C, LFE, SL, SR                          |
/// | `Side5_1`             | C, LFE, SL, SR, -, -                            |
/// | `SevenOneSwapped`     | C, LFE, SL, SR, BL, BR                          |
/// | `VbCableFrontFix`     | C, LFE, FL, FR, SL, SR                          |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChannelLayout {
    #[serde(rename = "stereo")]
    Stereo,
    #[default]
    #[serde(rename = "standard")]
    Standard5_1Plus,
    #[serde(rename = "alternative_c_lfe_last")]
    AlternativeCLfeLast,
    #[serde(rename = "side5_1")]
    Side5_1,
    #[serde(rename = "seven_one_swapped")]
    SevenOneSwapped,
    /// Virtual cables that route the stereo mix onto the rear pair.
    #[serde(rename = "vb_cable_front_fix")]
    VbCableFrontFix,
}

impl ChannelLayout {
    /// Every preset, in the order a settings UI would list them.
    pub const ALL: [ChannelLayout; 6] = [
        ChannelLayout::Standard5_1Plus,
        ChannelLayout::Stereo,
        ChannelLayout::AlternativeCLfeLast,
        ChannelLayout::Side5_1,
        ChannelLayout::VbCableFrontFix,
        ChannelLayout::SevenOneSwapped,
    ];

    /// A short human-readable label suitable for a settings drop-down.
    pub fn label(&self) -> &'static str {
        match self {
            ChannelLayout::Stereo => "Stereo",
            ChannelLayout::Standard5_1Plus => "Standard",
            ChannelLayout::AlternativeCLfeLast => "Alternative (C/LFE Last)",
            ChannelLayout::Side5_1 => "Side 5.1",
            ChannelLayout::SevenOneSwapped => "7.1 (Side/Back Swapped)",
            ChannelLayout::VbCableFrontFix => "VB-Cable (Fix Back->Front)",
        }
    }

    /// Overrides applied on top of [`STANDARD_TABLE`] for indices 2–7.
    ///
    /// `None` removes the index from the map.
    fn overrides(&self) -> &'static [(usize, Option<f32>)] {
        match self {
            ChannelLayout::Standard5_1Plus => &[],
            ChannelLayout::Stereo => &[
                (2, None),
                (3, None),
                (4, None),
                (5, None),
                (6, None),
                (7, None),
            ],
            ChannelLayout::AlternativeCLfeLast => &[
                (2, Some(-135.0)),
                (3, Some(135.0)),
                (4, Some(0.0)),
                (5, None),
            ],
            ChannelLayout::Side5_1 => &[(4, Some(-90.0)), (5, Some(90.0)), (6, None), (7, None)],
            ChannelLayout::SevenOneSwapped => &[
                (4, Some(-90.0)),
                (5, Some(90.0)),
                (6, Some(-135.0)),
                (7, Some(135.0)),
            ],
            ChannelLayout::VbCableFrontFix => &[(4, Some(-45.0)), (5, Some(45.0))],
        }
    }
}

// ---------------------------------------------------------------------------
// RadarMode
// ---------------------------------------------------------------------------

/// Coordinate convention for event positions, derived from channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadarMode {
    /// ≤ 2 channels: position is a scalar in `[-1, 1]` (left … right).
    Semi,
    /// > 2 channels: position is an azimuth in `(-180°, 180°]`.
    Full,
}

impl RadarMode {
    pub fn for_channels(channels: u16) -> Self {
        if channels <= 2 {
            RadarMode::Semi
        } else {
            RadarMode::Full
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelMap
// ---------------------------------------------------------------------------

/// Standard 8-channel table: FL, FR, C, (LFE), BL, BR, SL, SR.
const STANDARD_TABLE: [(usize, f32); 7] = [
    (0, -45.0),
    (1, 45.0),
    (2, 0.0),
    (4, -135.0),
    (5, 135.0),
    (6, -90.0),
    (7, 90.0),
];

/// Partial mapping from channel index to azimuth in degrees.
///
/// Iteration is in ascending channel order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelMap {
    angles: BTreeMap<usize, f32>,
}

impl ChannelMap {
    /// Build the map for `channels` physical channels under `layout`.
    ///
    /// ```
    /// use sound_radar::radar::{ChannelLayout, ChannelMap};
    ///
    /// let stereo = ChannelMap::build(2, ChannelLayout::Side5_1);
    /// assert_eq!(stereo.angle(0), Some(-45.0));
    /// assert_eq!(stereo.angle(1), Some(45.0));
    ///
    /// let surround = ChannelMap::build(6, ChannelLayout::Standard5_1Plus);
    /// assert_eq!(surround.angle(2), Some(0.0));
    /// assert_eq!(surround.angle(3), None); // LFE
    /// ```
    pub fn build(channels: u16, layout: ChannelLayout) -> Self {
        let count = channels as usize;
        let mut angles = BTreeMap::new();

        if channels <= 2 {
            for (index, angle) in [(0usize, -45.0f32), (1, 45.0)] {
                if index < count {
                    angles.insert(index, angle);
                }
            }
            return Self { angles };
        }

        for &(index, angle) in STANDARD_TABLE.iter() {
            angles.insert(index, angle);
        }
        for &(index, angle) in layout.overrides() {
            match angle {
                Some(a) => {
                    angles.insert(index, a);
                }
                None => {
                    angles.remove(&index);
                }
            }
        }
        angles.retain(|&index, _| index < count);

        Self { angles }
    }

    /// Azimuth of `channel`, or `None` when it is not spatialised.
    pub fn angle(&self, channel: usize) -> Option<f32> {
        self.angles.get(&channel).copied()
    }

    /// `(channel, angle)` pairs in ascending channel order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.angles.iter().map(|(&c, &a)| (c, a))
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
