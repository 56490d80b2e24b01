//! Pose input for the companion engine.
//!
//! This module provides:
//! - Landmark types matching what the pose source delivers
//! - The latest-only frame buffer between the source and classification
//! - A replay source that plays recorded ticks at camera rate

pub mod buffer;
pub mod replay;
pub mod types;

// Re-export commonly used types
pub use buffer::{BufferedTick, EntityFrames, LandmarkFrameBuffer, SharedFrameBuffer};
pub use replay::{parse_recording, ReplayConfig, ReplayError, ReplaySource};
pub use types::{HandLandmark, Landmark, LandmarkFrame, PoseResults, HAND_LANDMARK_COUNT};
