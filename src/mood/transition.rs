//! The pure mood reducer.
//!
//! `transition` maps a state and one event to the next state and the effects
//! to run. It performs no IO, so every rule is testable without a speech
//! engine or a chat backend.

use crate::gesture::GesturePayload;
use crate::mood::event::{Effect, MoodEvent, OutgoingMessage, Prompts, TurnOrigin};
use crate::mood::state::{CoordinatorState, Mood};

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: CoordinatorState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &CoordinatorState) -> Self {
        Self {
            state: *state,
            effects: Vec::new(),
        }
    }

    fn to(state: CoordinatorState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }
}

pub fn transition(state: &CoordinatorState, event: MoodEvent, prompts: &Prompts) -> Transition {
    match event {
        MoodEvent::UserMessage { text, image } => {
            // one round-trip at a time, no queue
            if state.round_trip_in_flight {
                return Transition::unchanged(state);
            }
            let display_label = if text.is_empty() {
                "[image]".to_string()
            } else {
                text.clone()
            };
            let next = CoordinatorState {
                mood: Mood::Thinking,
                round_trip_in_flight: true,
            };
            Transition::to(
                next,
                vec![Effect::SendChat(OutgoingMessage {
                    text,
                    image,
                    mood: next.mood,
                    display_label,
                    origin: TurnOrigin::Typed,
                })],
            )
        }

        MoodEvent::Gesture { event, image } => match event.payload {
            GesturePayload::Wave => {
                if state.mood == Mood::Excited || state.round_trip_in_flight {
                    return Transition::unchanged(state);
                }
                let next = CoordinatorState {
                    mood: Mood::Excited,
                    round_trip_in_flight: true,
                };
                Transition::to(
                    next,
                    vec![Effect::SendChat(OutgoingMessage {
                        text: prompts.wave.clone(),
                        image,
                        mood: next.mood,
                        display_label: "👋 *waves*".to_string(),
                        origin: TurnOrigin::Wave,
                    })],
                )
            }
            GesturePayload::FingerCount { count } => {
                if state.round_trip_in_flight {
                    return Transition::unchanged(state);
                }
                let next = CoordinatorState {
                    mood: state.mood,
                    round_trip_in_flight: true,
                };
                Transition::to(
                    next,
                    vec![Effect::SendChat(OutgoingMessage {
                        text: prompts.finger_count_message(count),
                        image: None,
                        mood: next.mood,
                        display_label: format!("✋ *holds up {count} fingers*"),
                        origin: TurnOrigin::FingerCount { count },
                    })],
                )
            }
        },

        // Mood waits for the speech engine so animation and audio stay in step.
        MoodEvent::ReplyReceived { text } => {
            if !state.round_trip_in_flight {
                return Transition::unchanged(state);
            }
            Transition::to(
                CoordinatorState {
                    mood: state.mood,
                    round_trip_in_flight: false,
                },
                vec![Effect::Speak(text)],
            )
        }

        MoodEvent::RoundTripFailed { .. } => {
            if !state.round_trip_in_flight {
                return Transition::unchanged(state);
            }
            Transition::to(
                CoordinatorState {
                    mood: Mood::Idle,
                    round_trip_in_flight: false,
                },
                Vec::new(),
            )
        }

        MoodEvent::SpeechStarted => {
            let mood = if state.mood == Mood::Excited {
                Mood::Excited
            } else {
                Mood::Talking
            };
            Transition::to(CoordinatorState { mood, ..*state }, Vec::new())
        }

        MoodEvent::SpeechEnded | MoodEvent::SpeechFailed { .. } => Transition::to(
            CoordinatorState {
                mood: Mood::Idle,
                ..*state
            },
            Vec::new(),
        ),
    }
}
