//! Per-frame gesture classifiers.
//!
//! Classifiers turn one landmark frame into a raw, possibly noisy signal.
//! They keep at most a minimal running state (`WaveDetector`) or none at all
//! (`FingerCountDetector`); temporal stability is the debouncer's job.

use crate::pose::types::{HandLandmark, LandmarkFrame};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default minimum lateral jump counted by the wave detector.
pub const WAVE_MOVEMENT_THRESHOLD: f64 = 0.05;

/// The two recognized gesture kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Wave,
    FingerCount,
}

impl GestureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wave => "wave",
            Self::FingerCount => "finger_count",
        }
    }
}

/// Raw classifier output for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureSignal {
    pub kind: GestureKind,
    /// Wave: current jump tally. FingerCount: extended fingers.
    pub value: u32,
    pub frame_timestamp: DateTime<Utc>,
}

/// Counts large lateral jumps of the wrist.
///
/// This is a rolling tally, not a frequency analysis: fast motion in one
/// direction satisfies it just as well as an actual wave.
#[derive(Debug, Clone)]
pub struct WaveDetector {
    threshold: f64,
    /// Starts at the left edge, so a hand entering the frame can count
    last_x: f64,
    wave_count: u32,
}

impl Default for WaveDetector {
    fn default() -> Self {
        Self::new(WAVE_MOVEMENT_THRESHOLD)
    }
}

impl WaveDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_x: 0.0,
            wave_count: 0,
        }
    }

    /// Feed one wrist x coordinate. Returns whether it counted as a jump.
    pub fn observe(&mut self, current_x: f64) -> bool {
        let jumped = (current_x - self.last_x).abs() > self.threshold;
        if jumped {
            self.wave_count += 1;
        }
        self.last_x = current_x;
        jumped
    }

    /// Classify a hand frame by its wrist position.
    pub fn classify(
        &mut self,
        frame: &LandmarkFrame,
        timestamp: DateTime<Utc>,
    ) -> Option<GestureSignal> {
        let wrist = frame.hand_point(HandLandmark::Wrist)?;
        self.observe(wrist.x);
        Some(GestureSignal {
            kind: GestureKind::Wave,
            value: self.wave_count,
            frame_timestamp: timestamp,
        })
    }

    pub fn wave_count(&self) -> u32 {
        self.wave_count
    }

    pub fn last_x(&self) -> f64 {
        self.last_x
    }

    /// Clear the jump tally, keeping the last position.
    pub fn reset_count(&mut self) {
        self.wave_count = 0;
    }
}

/// Counts extended fingers on a single hand frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerCountDetector;

impl FingerCountDetector {
    /// Number of extended fingers, or `None` for an incomplete hand.
    ///
    /// The thumb counts when its tip is farther from the palm center than its
    /// IP joint; the palm center is the midpoint of the wrist and the middle
    /// finger MCP. Other fingers count when the tip sits above the PIP joint.
    pub fn count(frame: &LandmarkFrame) -> Option<u8> {
        if !frame.is_complete_hand() {
            return None;
        }
        let point = |landmark: HandLandmark| frame.0[landmark.index()];

        let palm_center = point(HandLandmark::Wrist).midpoint(&point(HandLandmark::MiddleMcp));
        let thumb_tip = point(HandLandmark::ThumbTip).distance(&palm_center);
        let thumb_ip = point(HandLandmark::ThumbIp).distance(&palm_center);

        let mut count = u8::from(thumb_tip > thumb_ip);
        for (tip, pip) in HandLandmark::finger_tip_pip_pairs() {
            if point(tip).y < point(pip).y {
                count += 1;
            }
        }
        Some(count)
    }

    pub fn classify(frame: &LandmarkFrame, timestamp: DateTime<Utc>) -> Option<GestureSignal> {
        Self::count(frame).map(|count| GestureSignal {
            kind: GestureKind::FingerCount,
            value: u32::from(count),
            frame_timestamp: timestamp,
        })
    }
}
