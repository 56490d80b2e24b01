//! Events consumed and effects produced by the mood reducer.

use crate::gesture::GestureEvent;
use crate::mood::state::Mood;
use serde::{Deserialize, Serialize};

/// Everything that can move the mood.
#[derive(Debug, Clone, PartialEq)]
pub enum MoodEvent {
    /// The user sent a message (already trimmed and non-empty or with image).
    UserMessage { text: String, image: Option<String> },
    /// A debounced gesture, with the camera still captured alongside it.
    Gesture {
        event: GestureEvent,
        image: Option<String>,
    },
    /// The chat backend answered the in-flight round-trip.
    ReplyReceived { text: String },
    /// The in-flight round-trip failed.
    RoundTripFailed { reason: String },
    SpeechStarted,
    SpeechEnded,
    SpeechFailed { reason: String },
}

impl MoodEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserMessage { .. } => "user_message",
            Self::Gesture { .. } => "gesture",
            Self::ReplyReceived { .. } => "reply_received",
            Self::RoundTripFailed { .. } => "round_trip_failed",
            Self::SpeechStarted => "speech_started",
            Self::SpeechEnded => "speech_ended",
            Self::SpeechFailed { .. } => "speech_failed",
        }
    }
}

/// What caused an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnOrigin {
    Typed,
    Wave,
    FingerCount { count: u8 },
}

/// A message the coordinator wants sent to the chat backend.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub text: String,
    pub image: Option<String>,
    /// Mood at the moment of sending, forwarded as context
    pub mood: Mood,
    /// Label shown in the chat history for the user side of the turn
    pub display_label: String,
    pub origin: TurnOrigin,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SendChat(OutgoingMessage),
    Speak(String),
}

/// Fixed messages sent on behalf of gestures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    /// Sent with the camera still when the user waves
    pub wave: String,
    /// Sent when a finger count is held; `{count}` is replaced
    pub finger_count: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            wave: "I'm waving at you! Wave back and tell me what you see.".to_string(),
            finger_count: "I'm holding up {count} fingers! Can you count them?".to_string(),
        }
    }
}

impl Prompts {
    pub fn finger_count_message(&self, count: u8) -> String {
        self.finger_count.replace("{count}", &count.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finger_count_message() {
        let prompts = Prompts::default();
        let message = prompts.finger_count_message(3);
        assert!(message.contains("3 fingers"));
        assert!(!message.contains("{count}"));
    }

    #[test]
    fn test_turn_origin_serialization() {
        let json = serde_json::to_string(&TurnOrigin::FingerCount { count: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"finger_count","count":2}"#);
    }
}
