//! Conversation session.
//!
//! Serializes chat round-trips (at most one outstanding) and keeps the
//! append-only history of completed turns. The session never touches the
//! network itself; it builds the request, and the engine hands the outcome
//! back through [`ConversationSession::complete`].

use crate::backend::{BackendError, ChatRequest, ChatResponse};
use crate::mood::{Mood, MoodEvent, OutgoingMessage, TurnOrigin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Reply recorded in history when a round-trip fails for any reason.
pub const NETWORK_ERROR_REPLY: &str = "Error: Could not connect to companion.";

/// Session error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A round-trip is already outstanding
    Busy,
    /// A result arrived with nothing outstanding
    NoPending,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Busy => write!(f, "A chat round-trip is already in flight"),
            SessionError::NoPending => write!(f, "No chat round-trip is in flight"),
        }
    }
}

impl std::error::Error for SessionError {}

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: Uuid,
    pub outgoing_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub mood_at_send: Mood,
    pub reply: String,
    pub display_label: String,
    pub origin: TurnOrigin,
    pub failed: bool,
    pub sent_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Ordered, append-only list of turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }

    /// Number of turns whose round-trip failed.
    pub fn failed_count(&self) -> usize {
        self.turns.iter().filter(|t| t.failed).count()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone)]
struct PendingTurn {
    message: OutgoingMessage,
    sent_at: DateTime<Utc>,
}

/// One conversation with the companion.
#[derive(Debug)]
pub struct ConversationSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    pending: Option<PendingTurn>,
    history: ChatHistory,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            pending: None,
            history: ChatHistory::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Trim user input. `None` means there is nothing to send.
    pub fn normalize_input(text: &str, image: Option<&str>) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() && image.is_none() {
            return None;
        }
        Some(trimmed.to_string())
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Start a round-trip for `message` and return the request to send.
    pub fn begin(
        &mut self,
        message: OutgoingMessage,
        now: DateTime<Utc>,
    ) -> Result<ChatRequest, SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::Busy);
        }

        let request = ChatRequest {
            message: message.text.clone(),
            mood: message.mood.as_str().to_string(),
            image_url: message.image.clone(),
        };
        debug!(
            "Sending {:?} turn in mood {} (image: {})",
            message.origin,
            message.mood,
            message.image.is_some()
        );
        self.pending = Some(PendingTurn {
            message,
            sent_at: now,
        });
        Ok(request)
    }

    /// Record the outcome of the outstanding round-trip.
    ///
    /// Returns the event the mood coordinator must see next.
    pub fn complete(
        &mut self,
        result: Result<ChatResponse, BackendError>,
        now: DateTime<Utc>,
    ) -> Result<MoodEvent, SessionError> {
        let pending = self.pending.take().ok_or(SessionError::NoPending)?;

        let (reply, failed, event) = match result {
            Ok(response) => {
                let event = MoodEvent::ReplyReceived {
                    text: response.response.clone(),
                };
                (response.response, false, event)
            }
            Err(e) => {
                warn!("Chat round-trip failed: {e}");
                (
                    NETWORK_ERROR_REPLY.to_string(),
                    true,
                    MoodEvent::RoundTripFailed {
                        reason: e.to_string(),
                    },
                )
            }
        };

        let PendingTurn { message, sent_at } = pending;
        self.history.push(ChatTurn {
            id: Uuid::new_v4(),
            outgoing_text: message.text,
            image: message.image,
            mood_at_send: message.mood,
            reply,
            display_label: message.display_label,
            origin: message.origin,
            failed,
            sent_at,
            completed_at: now,
        });

        Ok(event)
    }
}
