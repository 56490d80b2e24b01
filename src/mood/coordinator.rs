//! Owner of the mood value.
//!
//! The coordinator is the only writer of the mood. Every other component
//! submits a [`MoodEvent`]; the coordinator runs the reducer, swaps in the
//! new state in one step and publishes the mood to renderers when it changes.

use crate::mood::event::{Effect, MoodEvent, Prompts};
use crate::mood::state::{CoordinatorState, Mood};
use crate::mood::transition::transition;
use tokio::sync::watch;
use tracing::{debug, info};

pub struct MoodCoordinator {
    state: CoordinatorState,
    prompts: Prompts,
    publisher: watch::Sender<Mood>,
    transitions: u64,
}

impl MoodCoordinator {
    pub fn new(prompts: Prompts) -> Self {
        let state = CoordinatorState::default();
        let (publisher, _) = watch::channel(state.mood);
        Self {
            state,
            prompts,
            publisher,
            transitions: 0,
        }
    }

    /// Subscribe to mood changes. The receiver starts at the current mood.
    pub fn subscribe(&self) -> watch::Receiver<Mood> {
        self.publisher.subscribe()
    }

    pub fn mood(&self) -> Mood {
        self.state.mood
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn round_trip_in_flight(&self) -> bool {
        self.state.round_trip_in_flight
    }

    /// Number of mood changes published so far.
    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    /// Apply one event and return the effects the caller must run.
    pub fn apply(&mut self, event: MoodEvent) -> Vec<Effect> {
        let name = event.name();
        let result = transition(&self.state, event, &self.prompts);
        let previous = std::mem::replace(&mut self.state, result.state);

        if previous.mood != self.state.mood {
            info!("Mood {} -> {} ({name})", previous.mood, self.state.mood);
            self.transitions += 1;
            self.publisher.send_replace(self.state.mood);
        } else if previous == self.state && result.effects.is_empty() {
            debug!("Ignored {name} in mood {}", self.state.mood);
        }

        result.effects
    }
}
