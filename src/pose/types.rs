//! Landmark types delivered by the pose source.
//!
//! Coordinates are normalized to the camera frame: `x` and `y` lie in [0, 1]
//! with `y` growing downwards. `z` is optional depth relative to the wrist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of landmarks in a complete hand frame.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// A single tracked point on a hand or face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// Planar distance to another landmark.
    pub fn distance(&self, other: &Landmark) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Point halfway between two landmarks.
    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// The 21 hand landmarks, in the order the pose source delivers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    /// Position of this landmark in a hand frame.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Tip and PIP joint pairs for the four non-thumb fingers.
    pub fn finger_tip_pip_pairs() -> [(HandLandmark, HandLandmark); 4] {
        [
            (Self::IndexTip, Self::IndexPip),
            (Self::MiddleTip, Self::MiddlePip),
            (Self::RingTip, Self::RingPip),
            (Self::PinkyTip, Self::PinkyPip),
        ]
    }
}

/// Ordered landmarks for one detected entity (a hand or a face) in one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkFrame(pub Vec<Landmark>);

impl LandmarkFrame {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self(landmarks)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a hand landmark, if the frame carries it.
    pub fn hand_point(&self, landmark: HandLandmark) -> Option<&Landmark> {
        self.0.get(landmark.index())
    }

    /// Whether the frame carries every hand landmark.
    pub fn is_complete_hand(&self) -> bool {
        self.0.len() >= HAND_LANDMARK_COUNT
    }
}

/// Everything the pose source reported for one camera tick.
///
/// An entity that was not detected contributes no frame. The optional image
/// is a still of the tick encoded as a base64 data URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseResults {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, alias = "handLandmarks")]
    pub hands: Vec<LandmarkFrame>,
    #[serde(default, alias = "faceLandmarks")]
    pub faces: Vec<LandmarkFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl PoseResults {
    /// An empty tick at the given time.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            hands: Vec::new(),
            faces: Vec::new(),
            image: None,
        }
    }

    pub fn with_hand(mut self, frame: LandmarkFrame) -> Self {
        self.hands.push(frame);
        self
    }

    pub fn with_face(mut self, frame: LandmarkFrame) -> Self {
        self.faces.push(frame);
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}
