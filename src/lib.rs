//! Companion Engine - gesture classification and mood coordination for an
//! animated chat companion.
//!
//! The engine watches hand landmarks from a camera pose source, recognises a
//! wave and a held finger count, and drives a small mood state machine that
//! decides what the companion's face shows and when it talks to the chat
//! backend.
//!
//! # Guarantees
//!
//! - **One writer**: mood changes only through the coordinator's reducer
//! - **One round-trip**: at most one chat request is in flight; input during a
//!   round-trip is dropped, never queued
//! - **Latest frame wins**: stale landmark frames are replaced, not queued
//! - **Always recovers**: backend and speech failures return the companion to
//!   idle
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Companion Engine                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐                │
//! │  │ Pose source│──▶│   Frame    │──▶│ Classifiers│                │
//! │  │  (replay)  │   │   Buffer   │   │ + Debounce │                │
//! │  └────────────┘   └────────────┘   └────────────┘                │
//! │                                          │ gesture events        │
//! │                                          ▼                       │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐ │
//! │  │  Speech    │◀──│    Mood    │──▶│Conversation│──▶│   Chat   │ │
//! │  │  engine    │──▶│ Coordinator│◀──│  Session   │◀──│  backend │ │
//! │  └────────────┘   └────────────┘   └────────────┘   └──────────┘ │
//! │                         │                                        │
//! │                         ▼ watch                                  │
//! │                   ┌────────────┐                                 │
//! │                   │  Renderer  │                                 │
//! │                   └────────────┘                                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use companion_engine::{
//!     stats::create_shared_log, Config, ConsoleSpeech, Engine, HttpChatBackend,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let backend = HttpChatBackend::new(config.backend.clone())?;
//! let speech = ConsoleSpeech::new(config.speech.words_per_minute);
//! let mut engine = Engine::new(&config, backend, speech, create_shared_log());
//!
//! let handle = engine.handle();
//! handle.send_message("hello", None);
//! engine.run().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod gesture;
pub mod mood;
pub mod pose;
pub mod session;
pub mod speech;
pub mod stats;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use backend::{
    BackendConfig, BackendError, ChatBackend, ChatRequest, ChatResponse, HttpChatBackend,
};
pub use config::{Config, GestureConfig, StateScope};
pub use engine::{Engine, EngineCommand, EngineHandle};
pub use gesture::{EventDebouncer, GestureEvent, GestureKind, GesturePayload};
pub use mood::{Mood, MoodCoordinator, MoodEvent};
pub use pose::{LandmarkFrame, LandmarkFrameBuffer, PoseResults};
pub use session::{ChatHistory, ChatTurn, ConversationSession, NETWORK_ERROR_REPLY};
pub use speech::{ConsoleSpeech, RelaySpeech, SpeechEngine, SpeechSignal, Utterance};
pub use stats::{ActivityLog, ActivityStats, SharedActivityLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Camera notice that can be displayed to users.
pub const CAMERA_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              COMPANION ENGINE - CAMERA NOTICE                    ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  The companion watches your hands to notice waves and finger     ║
║  counts.                                                         ║
║                                                                  ║
║  ✓ WHAT IS USED:                                                 ║
║    • Hand landmark positions, frame by frame                     ║
║    • One camera still, sent with a wave or a message you send    ║
║                                                                  ║
║  ✗ WHAT IS NEVER DONE:                                           ║
║    • Frames are never written to disk                            ║
║    • Stills are never sent without a gesture or message          ║
║    • Faces are counted, never identified                         ║
║                                                                  ║
║  You can view activity statistics anytime with:                  ║
║    companion status                                              ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
