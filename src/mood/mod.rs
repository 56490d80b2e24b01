//! Mood coordination.
//!
//! Implements the companion's mood as a pure state machine: gesture events,
//! chat round-trip results and speech lifecycle signals are fed through
//! [`transition`], and [`MoodCoordinator`] owns the resulting state.

pub mod coordinator;
pub mod event;
pub mod state;
pub mod transition;

#[cfg(test)]
mod proptests;

pub use coordinator::MoodCoordinator;
pub use event::{Effect, MoodEvent, OutgoingMessage, Prompts, TurnOrigin};
pub use state::{CoordinatorState, Mood, UnknownMood, VisualTarget, BLINK_INTERVAL_MS};
pub use transition::{transition, Transition};
