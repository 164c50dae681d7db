//! Seismic intensity codec
//!
//! Maps the numeric intensity scale used by the feed to the JMA
//! human-readable classification. The table is fixed; callers pick the
//! fallback per call site:
//!
//! - [`classify`]: unrecognised values are logged and map to
//!   [`IntensityLabel::Unknown`]
//! - [`classify_strict`]: unrecognised values are logged and returned as
//!   an [`UnexpectedIntensityError`] carrying the offending value

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Scale value the feed uses for "unknown"
pub const SCALE_UNKNOWN: i32 = -1;

/// Smallest scale that corresponds to a felt intensity (震度1)
pub const SCALE_MIN_FELT: i32 = 10;

/// Human-readable JMA seismic intensity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntensityLabel {
    /// 不明
    Unknown,
    /// 震度0
    Scale0,
    /// 震度1
    Scale1,
    /// 震度2
    Scale2,
    /// 震度3
    Scale3,
    /// 震度4
    Scale4,
    /// 震度5弱
    Scale5Lower,
    /// 震度5強
    Scale5Upper,
    /// 震度6弱
    Scale6Lower,
    /// 震度6強
    Scale6Upper,
    /// 震度7
    Scale7,
    /// 震度7程度以上
    Scale7OrGreater,
}

impl IntensityLabel {
    /// Label as shown to subscribers
    pub fn as_str(&self) -> &'static str {
        match self {
            IntensityLabel::Unknown => "不明",
            IntensityLabel::Scale0 => "震度0",
            IntensityLabel::Scale1 => "震度1",
            IntensityLabel::Scale2 => "震度2",
            IntensityLabel::Scale3 => "震度3",
            IntensityLabel::Scale4 => "震度4",
            IntensityLabel::Scale5Lower => "震度5弱",
            IntensityLabel::Scale5Upper => "震度5強",
            IntensityLabel::Scale6Lower => "震度6弱",
            IntensityLabel::Scale6Upper => "震度6強",
            IntensityLabel::Scale7 => "震度7",
            IntensityLabel::Scale7OrGreater => "震度7程度以上",
        }
    }

    /// Whether this is the "unknown" label
    pub fn is_unknown(&self) -> bool {
        matches!(self, IntensityLabel::Unknown)
    }
}

impl fmt::Display for IntensityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised by [`classify_strict`] for a scale value outside the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unexpected intensity: {intensity}")]
pub struct UnexpectedIntensityError {
    intensity: i32,
}

impl UnexpectedIntensityError {
    /// Create the error for an offending scale value
    pub fn new(intensity: i32) -> Self {
        Self { intensity }
    }

    /// The scale value that was not recognised
    pub fn intensity(&self) -> i32 {
        self.intensity
    }
}

fn lookup(scale: i32) -> Option<IntensityLabel> {
    let label = match scale {
        SCALE_UNKNOWN => IntensityLabel::Unknown,
        0 => IntensityLabel::Scale0,
        10 => IntensityLabel::Scale1,
        20 => IntensityLabel::Scale2,
        30 => IntensityLabel::Scale3,
        40 => IntensityLabel::Scale4,
        45 => IntensityLabel::Scale5Lower,
        50 => IntensityLabel::Scale5Upper,
        55 => IntensityLabel::Scale6Lower,
        60 => IntensityLabel::Scale6Upper,
        70 => IntensityLabel::Scale7,
        99 => IntensityLabel::Scale7OrGreater,
        _ => return None,
    };
    Some(label)
}

/// Classify a scale value, mapping unrecognised values to `Unknown`
pub fn classify(scale: i32) -> IntensityLabel {
    lookup(scale).unwrap_or_else(|| {
        warn!("intensity classify: unexpected value: {}", scale);
        IntensityLabel::Unknown
    })
}

/// Classify a scale value, failing on unrecognised values
pub fn classify_strict(scale: i32) -> Result<IntensityLabel, UnexpectedIntensityError> {
    lookup(scale).ok_or_else(|| {
        warn!("intensity classify_strict: unexpected value: {}", scale);
        UnexpectedIntensityError::new(scale)
    })
}
