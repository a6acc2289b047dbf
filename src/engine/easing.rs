// Easing curves: normalized time in [0, 1] -> normalized progress in [0, 1].
// Every curve satisfies f(0) = 0 and f(1) = 1 and is monotonic on [0, 1].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::config::RawTag;
use super::error::FlythroughError;

/// Easing curve selector authored per waypoint (velocity, rotation, position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RawTag")]
pub enum EasingType {
    #[default]
    Linear = 0,
    EaseIn = 1,
    EaseOut = 2,
    EaseInOut = 3,
}

type EasingFn = fn(f32, f32) -> f32;

/// Dispatch table keyed by the enum discriminant.
const EASING_TABLE: [EasingFn; 4] = [linear, ease_in, ease_out, ease_in_out];

impl EasingType {
    pub const ALL: [EasingType; 4] = [
        EasingType::Linear,
        EasingType::EaseIn,
        EasingType::EaseOut,
        EasingType::EaseInOut,
    ];

    /// Eases `t` over the unit interval.
    #[inline]
    pub fn apply(self, t: f32) -> f32 {
        self.apply_over(t, 1.0)
    }

    /// Eases `time` over an interval of length `duration`.
    #[inline]
    pub fn apply_over(self, time: f32, duration: f32) -> f32 {
        EASING_TABLE[self as usize](time, duration)
    }

    pub fn name(self) -> &'static str {
        match self {
            EasingType::Linear => "Linear",
            EasingType::EaseIn => "EaseIn",
            EasingType::EaseOut => "EaseOut",
            EasingType::EaseInOut => "EaseInOut",
        }
    }
}

impl fmt::Display for EasingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EasingType {
    type Err = FlythroughError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "linear" => Ok(EasingType::Linear),
            "easein" => Ok(EasingType::EaseIn),
            "easeout" => Ok(EasingType::EaseOut),
            "easeinout" => Ok(EasingType::EaseInOut),
            _ => Err(FlythroughError::UnknownEasing(s.to_string())),
        }
    }
}

impl TryFrom<u64> for EasingType {
    type Error = FlythroughError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| FlythroughError::UnknownEasing(value.to_string()))
    }
}

impl TryFrom<RawTag> for EasingType {
    type Error = FlythroughError;

    fn try_from(tag: RawTag) -> Result<Self, Self::Error> {
        match tag {
            RawTag::Index(i) => Self::try_from(i),
            RawTag::Name(name) => name.parse(),
        }
    }
}

// ============================================================================
// CURVES
// ============================================================================

pub fn linear(time: f32, duration: f32) -> f32 {
    time / duration
}

pub fn ease_in(time: f32, duration: f32) -> f32 {
    let t = time / duration;
    t * t
}

pub fn ease_out(time: f32, duration: f32) -> f32 {
    let t = time / duration;
    -t * (t - 2.0)
}

/// Quadratic in for the first half, quadratic out for the second.
pub fn ease_in_out(time: f32, duration: f32) -> f32 {
    let t = time / (duration * 0.5);
    if t < 1.0 {
        return 0.5 * t * t;
    }
    let t = t - 1.0;
    -0.5 * (t * (t - 2.0) - 1.0)
}
