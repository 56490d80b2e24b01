//! Mood values and coordinator state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The single authoritative emotional/activity state of the companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Idle,
    Thinking,
    Talking,
    Excited,
    Happy,
    Sad,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Idle,
        Mood::Thinking,
        Mood::Talking,
        Mood::Excited,
        Mood::Happy,
        Mood::Sad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Talking => "talking",
            Self::Excited => "excited",
            Self::Happy => "happy",
            Self::Sad => "sad",
        }
    }

    /// Animation targets the renderer interpolates towards for this mood.
    pub fn visual_target(&self) -> VisualTarget {
        match self {
            Self::Idle => VisualTarget {
                pupil_scale: 1.0,
                offset_y: 0.0,
                blinks: true,
                loop_period_ms: None,
            },
            Self::Thinking => VisualTarget {
                pupil_scale: 1.0,
                offset_y: -5.0,
                blinks: false,
                loop_period_ms: Some(2000),
            },
            Self::Talking => VisualTarget {
                pupil_scale: 1.2,
                offset_y: 0.0,
                blinks: false,
                loop_period_ms: Some(300),
            },
            Self::Excited => VisualTarget {
                pupil_scale: 1.3,
                offset_y: -5.0,
                blinks: false,
                loop_period_ms: None,
            },
            Self::Happy => VisualTarget {
                pupil_scale: 1.1,
                offset_y: -2.0,
                blinks: false,
                loop_period_ms: None,
            },
            Self::Sad => VisualTarget {
                pupil_scale: 0.9,
                offset_y: 4.0,
                blinks: false,
                loop_period_ms: None,
            },
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized mood name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMood(pub String);

impl fmt::Display for UnknownMood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown mood: {}", self.0)
    }
}

impl std::error::Error for UnknownMood {}

impl FromStr for Mood {
    type Err = UnknownMood;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Mood::ALL
            .into_iter()
            .find(|mood| mood.as_str() == name)
            .ok_or_else(|| UnknownMood(s.to_string()))
    }
}

/// Per-mood animation targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualTarget {
    /// Pupil scale relative to rest
    pub pupil_scale: f32,
    /// Vertical pupil offset in pixels (negative is up)
    pub offset_y: f32,
    /// Whether periodic blinking runs in this mood
    pub blinks: bool,
    /// Period of the looping animation, if the mood has one
    pub loop_period_ms: Option<u32>,
}

/// Interval between idle blinks.
pub const BLINK_INTERVAL_MS: u32 = 4000;

/// Everything the mood reducer decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoordinatorState {
    pub mood: Mood,
    /// A chat round-trip has been sent and not yet resolved
    pub round_trip_in_flight: bool,
}
