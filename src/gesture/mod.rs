//! Gesture recognition for the companion engine.
//!
//! This module contains:
//! - Per-frame classifiers (wave, finger count)
//! - The debouncer that turns classifier output into discrete events

pub mod classifier;
pub mod debounce;

// Re-export commonly used types
pub use classifier::{
    FingerCountDetector, GestureKind, GestureSignal, WaveDetector, WAVE_MOVEMENT_THRESHOLD,
};
pub use debounce::{Cooldown, EventDebouncer, GestureEvent, GesturePayload};
