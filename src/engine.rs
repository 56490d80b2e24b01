//! The engine event loop.
//!
//! One task owns the debouncer, the mood coordinator and the conversation
//! session, and serially consumes four inputs:
//!
//! - landmark ticks from the frame buffer
//! - commands (typed messages, shutdown) from [`EngineHandle`]s
//! - chat round-trip completions
//! - speech lifecycle signals
//!
//! Nothing else mutates that state. Chat round-trips run as spawned tasks and
//! report back through a channel, so a slow backend never stalls
//! classification.

use crate::backend::{BackendError, ChatBackend, ChatResponse};
use crate::config::Config;
use crate::gesture::{EventDebouncer, GesturePayload};
use crate::mood::{CoordinatorState, Effect, Mood, MoodCoordinator, MoodEvent, OutgoingMessage};
use crate::pose::{BufferedTick, LandmarkFrameBuffer, PoseResults, SharedFrameBuffer};
use crate::session::{ChatHistory, ConversationSession};
use crate::speech::{SpeechEngine, SpeechSignal, SpeechSink};
use crate::stats::SharedActivityLog;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Commands accepted by a running engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    UserMessage { text: String, image: Option<String> },
    Shutdown,
}

type Completion = Result<ChatResponse, BackendError>;

/// Cloneable handle for feeding a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
    speech: SpeechSink,
    frames: SharedFrameBuffer,
    mood: watch::Receiver<Mood>,
}

impl EngineHandle {
    /// Queue a typed message. Returns false once the engine has stopped.
    pub fn send_message(&self, text: impl Into<String>, image: Option<String>) -> bool {
        self.commands
            .send(EngineCommand::UserMessage {
                text: text.into(),
                image,
            })
            .is_ok()
    }

    /// Report a lifecycle signal from an external speech engine.
    pub fn speech_signal(&self, signal: SpeechSignal) -> bool {
        self.speech.send(signal).is_ok()
    }

    /// Publish one tick from the pose source.
    pub fn publish_pose(&self, results: PoseResults) {
        self.frames.publish(results);
    }

    pub fn frames(&self) -> &SharedFrameBuffer {
        &self.frames
    }

    pub fn mood(&self) -> Mood {
        *self.mood.borrow()
    }

    /// A fresh renderer subscription.
    pub fn subscribe(&self) -> watch::Receiver<Mood> {
        self.mood.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(EngineCommand::Shutdown);
    }
}

/// Gesture-to-conversation engine.
pub struct Engine<B: ChatBackend, S: SpeechEngine> {
    coordinator: MoodCoordinator,
    debouncer: EventDebouncer,
    session: ConversationSession,
    backend: Arc<B>,
    speech: S,
    frames: SharedFrameBuffer,
    stats: SharedActivityLog,
    round_trip_timeout: Duration,
    commands_tx: mpsc::UnboundedSender<EngineCommand>,
    commands_rx: mpsc::UnboundedReceiver<EngineCommand>,
    speech_tx: SpeechSink,
    speech_rx: mpsc::UnboundedReceiver<SpeechSignal>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<B: ChatBackend, S: SpeechEngine> Engine<B, S> {
    pub fn new(config: &Config, backend: B, speech: S, stats: SharedActivityLog) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (speech_tx, speech_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Self {
            coordinator: MoodCoordinator::new(config.prompts.clone()),
            debouncer: EventDebouncer::new(&config.gesture),
            session: ConversationSession::new(),
            backend: Arc::new(backend),
            speech,
            frames: LandmarkFrameBuffer::shared(),
            stats,
            round_trip_timeout: config.backend.timeout,
            commands_tx,
            commands_rx,
            speech_tx,
            speech_rx,
            completions_tx,
            completions_rx,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            commands: self.commands_tx.clone(),
            speech: self.speech_tx.clone(),
            frames: Arc::clone(&self.frames),
            mood: self.coordinator.subscribe(),
        }
    }

    pub fn mood(&self) -> Mood {
        self.coordinator.mood()
    }

    pub fn state(&self) -> CoordinatorState {
        self.coordinator.state()
    }

    pub fn history(&self) -> &ChatHistory {
        self.session.history()
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn debouncer(&self) -> &EventDebouncer {
        &self.debouncer
    }

    pub fn stats(&self) -> &SharedActivityLog {
        &self.stats
    }

    /// Classify one buffered tick and feed any gesture events to the coordinator.
    pub fn process_tick(&mut self, tick: BufferedTick) {
        let hand_count = tick.hands.as_ref().map_or(0, |h| h.frames.len());
        let face_count = tick.faces.as_ref().map_or(0, |f| f.frames.len());
        self.stats.record_tick(hand_count, face_count, tick.superseded);

        // A face-only tick says nothing about hands.
        let Some(hands) = tick.hands else {
            return;
        };

        for event in self.debouncer.process_hands(&hands.frames, hands.timestamp) {
            self.stats.record_gesture(event.kind());
            let image = match event.payload {
                GesturePayload::Wave => self.frames.capture_image(),
                GesturePayload::FingerCount { .. } => None,
            };
            self.apply(MoodEvent::Gesture { event, image });
        }
    }

    /// Submit a typed message. Returns whether a round-trip was started.
    pub fn submit_message(&mut self, text: &str, image: Option<String>) -> bool {
        let Some(text) = ConversationSession::normalize_input(text, image.as_deref()) else {
            debug!("Ignoring empty message");
            return false;
        };
        if self.coordinator.round_trip_in_flight() {
            info!("Dropping message while a round-trip is in flight");
            return false;
        }
        self.apply(MoodEvent::UserMessage { text, image });
        true
    }

    pub fn on_speech(&mut self, signal: SpeechSignal) {
        let event = match signal {
            SpeechSignal::Started => MoodEvent::SpeechStarted,
            SpeechSignal::Ended => {
                self.speech.finished();
                MoodEvent::SpeechEnded
            }
            SpeechSignal::Failed { reason } => {
                warn!("Speech failed: {reason}");
                self.speech.finished();
                MoodEvent::SpeechFailed { reason }
            }
        };
        self.apply(event);
    }

    pub fn on_chat_completed(&mut self, result: Completion) {
        let failed = result.is_err();
        match self.session.complete(result, Utc::now()) {
            Ok(event) => {
                if failed {
                    self.stats.record_failed_round_trip();
                } else {
                    info!("Chat round-trip completed");
                }
                self.apply(event);
            }
            Err(e) => warn!("Discarding chat result: {e}"),
        }
    }

    fn apply(&mut self, event: MoodEvent) {
        let before = self.coordinator.transition_count();
        let effects = self.coordinator.apply(event);
        self.stats
            .record_mood_transitions(self.coordinator.transition_count() - before);

        for effect in effects {
            match effect {
                Effect::SendChat(message) => self.start_round_trip(message),
                Effect::Speak(text) => self.speech.speak(&text, &self.speech_tx),
            }
        }
    }

    fn start_round_trip(&mut self, message: OutgoingMessage) {
        let request = match self.session.begin(message, Utc::now()) {
            Ok(request) => request,
            Err(e) => {
                warn!("{e}");
                return;
            }
        };
        self.stats.record_round_trip();
        info!(
            "Chat round-trip started (mood: {}, image: {})",
            request.mood,
            request.image_url.is_some()
        );

        let backend = Arc::clone(&self.backend);
        let completions = self.completions_tx.clone();
        let limit = self.round_trip_timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(limit, backend.send(request)).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout(limit)),
            };
            let _ = completions.send(result);
        });
    }

    /// Handle exactly one input. Returns false when shutdown was requested.
    pub async fn step(&mut self) -> bool {
        let frames = Arc::clone(&self.frames);

        tokio::select! {
            biased;

            Some(command) = self.commands_rx.recv() => match command {
                EngineCommand::UserMessage { text, image } => {
                    self.submit_message(&text, image);
                    true
                }
                EngineCommand::Shutdown => false,
            },
            Some(result) = self.completions_rx.recv() => {
                self.on_chat_completed(result);
                true
            }
            Some(signal) = self.speech_rx.recv() => {
                self.on_speech(signal);
                true
            }
            tick = frames.next() => {
                self.process_tick(tick);
                true
            }
        }
    }

    /// Run until an [`EngineCommand::Shutdown`] arrives.
    pub async fn run(&mut self) {
        info!("Engine started in mood {}", self.mood());
        while self.step().await {}
        info!(
            "Engine stopped after {} turns in mood {}",
            self.history().len(),
            self.mood()
        );
    }
}
