//! Speech engine interface and built-in engines.
//!
//! A speech engine accepts text and reports its playback lifecycle through a
//! [`SpeechSink`]. Submitting new text supersedes whatever is still playing;
//! a superseded utterance reports nothing further.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Playback lifecycle signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum SpeechSignal {
    Started,
    Ended,
    Failed { reason: String },
}

/// Channel on which engines report lifecycle signals.
pub type SpeechSink = mpsc::UnboundedSender<SpeechSignal>;

/// Anything that can speak a reply.
pub trait SpeechEngine: Send {
    fn speak(&mut self, text: &str, sink: &SpeechSink);

    /// Called once the current utterance ended or failed.
    fn finished(&mut self) {}
}

/// Speaks by logging the text and holding playback for a reading-time estimate.
pub struct ConsoleSpeech {
    words_per_minute: u32,
    playback: Option<JoinHandle<()>>,
}

impl ConsoleSpeech {
    pub fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
            playback: None,
        }
    }

    /// Estimated time to read `text` aloud.
    pub fn estimate_duration(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u64;
        Duration::from_millis(words * 60_000 / u64::from(self.words_per_minute))
    }
}

impl SpeechEngine for ConsoleSpeech {
    fn speak(&mut self, text: &str, sink: &SpeechSink) {
        if let Some(previous) = self.playback.take() {
            previous.abort();
        }

        if text.trim().is_empty() {
            warn!("Nothing to speak");
            let _ = sink.send(SpeechSignal::Failed {
                reason: "empty utterance".to_string(),
            });
            return;
        }

        let duration = self.estimate_duration(text);
        let text = text.to_string();
        let sink = sink.clone();

        self.playback = Some(tokio::spawn(async move {
            let _ = sink.send(SpeechSignal::Started);
            info!("Companion says: {text}");
            tokio::time::sleep(duration).await;
            let _ = sink.send(SpeechSignal::Ended);
        }));
    }
}

impl Drop for ConsoleSpeech {
    fn drop(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.abort();
        }
    }
}

/// One reply handed to an external player.
///
/// Ids increase per engine, so a player can tell a repeated reply from the
/// one it already spoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Utterance {
    pub id: u64,
    pub text: String,
}

/// Hands utterances to an external player and waits for its signals.
///
/// The player learns the text from the watch channel and reports lifecycle
/// signals back through the engine handle. The outbox is emptied once the
/// player reports the end of playback.
pub struct RelaySpeech {
    outbox: watch::Sender<Option<Utterance>>,
    next_id: u64,
}

impl RelaySpeech {
    pub fn new() -> (Self, watch::Receiver<Option<Utterance>>) {
        let (outbox, receiver) = watch::channel(None);
        (Self { outbox, next_id: 1 }, receiver)
    }
}

impl SpeechEngine for RelaySpeech {
    fn speak(&mut self, text: &str, _sink: &SpeechSink) {
        let utterance = Utterance {
            id: self.next_id,
            text: text.to_string(),
        };
        self.next_id += 1;
        self.outbox.send_replace(Some(utterance));
    }

    fn finished(&mut self) {
        self.outbox.send_replace(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_estimate() {
        let speech = ConsoleSpeech::new(120);
        assert_eq!(
            speech.estimate_duration("one two three four"),
            Duration::from_secs(2)
        );
        assert_eq!(speech.estimate_duration(""), Duration::ZERO);
    }

    #[test]
    fn test_signal_serialization() {
        let json = serde_json::to_string(&SpeechSignal::Started).unwrap();
        assert_eq!(json, r#"{"signal":"started"}"#);

        let failed: SpeechSignal =
            serde_json::from_str(r#"{"signal":"failed","reason":"no voices"}"#).unwrap();
        assert_eq!(
            failed,
            SpeechSignal::Failed {
                reason: "no voices".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_console_speech_lifecycle() {
        let (sink, mut signals) = mpsc::unbounded_channel();
        let mut speech = ConsoleSpeech::new(60_000);

        speech.speak("hi there", &sink);
        assert_eq!(signals.recv().await, Some(SpeechSignal::Started));
        assert_eq!(signals.recv().await, Some(SpeechSignal::Ended));
    }

    #[tokio::test]
    async fn test_new_utterance_supersedes_playback() {
        let (sink, mut signals) = mpsc::unbounded_channel();
        let mut speech = ConsoleSpeech::new(1);

        speech.speak("a very long first reply", &sink);
        assert_eq!(signals.recv().await, Some(SpeechSignal::Started));

        speech.speak("", &sink);
        assert!(matches!(
            signals.recv().await,
            Some(SpeechSignal::Failed { .. })
        ));
        // the first utterance was aborted and never reports its end
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(signals.try_recv().is_err());
    }

    #[test]
    fn test_relay_publishes_text() {
        let (sink, _signals) = mpsc::unbounded_channel();
        let (mut speech, outbox) = RelaySpeech::new();
        speech.speak("hello", &sink);
        let utterance = outbox.borrow().clone().unwrap();
        assert_eq!(utterance.text, "hello");
        assert_eq!(utterance.id, 1);
    }

    #[test]
    fn test_relay_repeated_reply_gets_new_id() {
        let (sink, _signals) = mpsc::unbounded_channel();
        let (mut speech, outbox) = RelaySpeech::new();

        speech.speak("same again", &sink);
        let first = outbox.borrow().clone().unwrap();
        speech.finished();
        assert!(outbox.borrow().is_none());

        speech.speak("same again", &sink);
        let second = outbox.borrow().clone().unwrap();
        assert_eq!(first.text, second.text);
        assert_ne!(first.id, second.id);
    }
}
