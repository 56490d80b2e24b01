//! Property tests for the mood reducer over arbitrary event sequences.

use crate::gesture::{GestureEvent, GesturePayload};
use crate::mood::event::{Effect, MoodEvent, Prompts};
use crate::mood::state::{CoordinatorState, Mood};
use crate::mood::transition::transition;
use chrono::Utc;
use proptest::prelude::*;

fn arb_event() -> impl Strategy<Value = MoodEvent> {
    prop_oneof![
        "[a-z ]{0,12}".prop_map(|text| MoodEvent::UserMessage { text, image: None }),
        Just(MoodEvent::Gesture {
            event: GestureEvent {
                payload: GesturePayload::Wave,
                emitted_at: Utc::now(),
            },
            image: None,
        }),
        (1u8..=5).prop_map(|count| MoodEvent::Gesture {
            event: GestureEvent {
                payload: GesturePayload::FingerCount { count },
                emitted_at: Utc::now(),
            },
            image: None,
        }),
        "[a-z ]{1,12}".prop_map(|text| MoodEvent::ReplyReceived { text }),
        Just(MoodEvent::RoundTripFailed {
            reason: "unreachable".to_string()
        }),
        Just(MoodEvent::SpeechStarted),
        Just(MoodEvent::SpeechEnded),
        Just(MoodEvent::SpeechFailed {
            reason: "no voice".to_string()
        }),
    ]
}

fn is_wave(event: &MoodEvent) -> bool {
    matches!(
        event,
        MoodEvent::Gesture {
            event: GestureEvent {
                payload: GesturePayload::Wave,
                ..
            },
            ..
        }
    )
}

proptest! {
    #[test]
    fn mood_is_always_a_single_known_value(
        events in proptest::collection::vec(arb_event(), 0..64),
    ) {
        let prompts = Prompts::default();
        let mut state = CoordinatorState::default();
        for event in events {
            state = transition(&state, event, &prompts).state;
            prop_assert_eq!(Mood::ALL.iter().filter(|m| **m == state.mood).count(), 1);
        }
    }

    #[test]
    fn never_two_round_trips_at_once(
        events in proptest::collection::vec(arb_event(), 0..64),
    ) {
        let prompts = Prompts::default();
        let mut state = CoordinatorState::default();
        for event in events {
            let result = transition(&state, event, &prompts);
            let sends = result
                .effects
                .iter()
                .filter(|e| matches!(e, Effect::SendChat(_)))
                .count();
            if state.round_trip_in_flight {
                prop_assert_eq!(sends, 0);
            }
            prop_assert!(sends <= 1);
            if sends == 1 {
                prop_assert!(result.state.round_trip_in_flight);
            }
            state = result.state;
        }
    }

    #[test]
    fn excited_in_flight_ignores_waves(
        events in proptest::collection::vec(arb_event(), 0..64),
    ) {
        let prompts = Prompts::default();
        let mut state = CoordinatorState::default();
        for event in events {
            let guarded = state.mood == Mood::Excited && state.round_trip_in_flight;
            let wave = is_wave(&event);
            let result = transition(&state, event, &prompts);
            if guarded && wave {
                prop_assert_eq!(result.state, state);
                prop_assert!(result.effects.is_empty());
            }
            state = result.state;
        }
    }

    #[test]
    fn speech_start_respects_excited(
        events in proptest::collection::vec(arb_event(), 0..64),
    ) {
        let prompts = Prompts::default();
        let mut state = CoordinatorState::default();
        for event in events {
            let started = matches!(event, MoodEvent::SpeechStarted);
            let before = state.mood;
            state = transition(&state, event, &prompts).state;
            if started {
                let expected = if before == Mood::Excited { Mood::Excited } else { Mood::Talking };
                prop_assert_eq!(state.mood, expected);
            }
        }
    }
}
