//! Integration tests for the engine event loop

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use companion_engine::{
    backend::{BackendError, ChatBackend, ChatRequest, ChatResponse},
    engine::EngineHandle,
    pose::{HandLandmark, Landmark, LandmarkFrame, PoseResults, HAND_LANDMARK_COUNT},
    speech::{SpeechEngine, SpeechSignal, SpeechSink},
    stats::create_shared_log,
    Config, Engine, Mood, NETWORK_ERROR_REPLY,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const STILL: &str = "data:image/jpeg;base64,AAAA";

#[derive(Clone)]
struct FakeBackend {
    reply: Result<String, BackendError>,
    delay: Duration,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl FakeBackend {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
            requests: Arc::default(),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err(BackendError::Network("connection refused".to_string())),
            ..Self::replying("")
        }
    }

    fn hanging() -> Self {
        Self {
            delay: Duration::from_secs(60),
            ..Self::replying("too late")
        }
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatBackend for FakeBackend {
    fn send(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, BackendError>> + Send {
        let reply = self.reply.clone();
        let delay = self.delay;
        let requests = Arc::clone(&self.requests);
        async move {
            requests.lock().unwrap().push(request);
            tokio::time::sleep(delay).await;
            reply.map(|response| ChatResponse { response })
        }
    }
}

#[derive(Clone, Default)]
struct ScriptedSpeech {
    spoken: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl ScriptedSpeech {
    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl SpeechEngine for ScriptedSpeech {
    fn speak(&mut self, text: &str, sink: &SpeechSink) {
        self.spoken.lock().unwrap().push(text.to_string());
        if self.fail {
            let _ = sink.send(SpeechSignal::Failed {
                reason: "no voices".to_string(),
            });
        } else {
            let _ = sink.send(SpeechSignal::Started);
            let _ = sink.send(SpeechSignal::Ended);
        }
    }
}

fn engine_with(
    config: &Config,
    backend: &FakeBackend,
    speech: &ScriptedSpeech,
) -> Engine<FakeBackend, ScriptedSpeech> {
    Engine::new(config, backend.clone(), speech.clone(), create_shared_log())
}

async fn drive(engine: &mut Engine<FakeBackend, ScriptedSpeech>) {
    let running = tokio::time::timeout(Duration::from_secs(2), engine.step())
        .await
        .expect("engine had nothing to process");
    assert!(running);
}

/// Let spawned round-trip tasks reach the backend.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// An open hand with every landmark at one point: zero fingers extended.
fn flat_hand(wrist_x: f64) -> LandmarkFrame {
    LandmarkFrame::new(vec![Landmark::new(wrist_x, 0.5); HAND_LANDMARK_COUNT])
}

fn three_fingers() -> LandmarkFrame {
    let mut points = vec![Landmark::new(0.5, 0.6); HAND_LANDMARK_COUNT];
    for tip in [
        HandLandmark::IndexTip,
        HandLandmark::MiddleTip,
        HandLandmark::RingTip,
    ] {
        points[tip.index()] = Landmark::new(0.5, 0.3);
    }
    LandmarkFrame::new(points)
}

fn frame_time(start: DateTime<Utc>, index: i64) -> DateTime<Utc> {
    start + ChronoDuration::milliseconds(33 * index)
}

async fn publish_and_drive(
    engine: &mut Engine<FakeBackend, ScriptedSpeech>,
    handle: &EngineHandle,
    results: PoseResults,
) {
    handle.publish_pose(results);
    drive(engine).await;
}

#[tokio::test]
async fn test_empty_message_is_a_no_op() {
    let backend = FakeBackend::replying("hi there");
    let speech = ScriptedSpeech::default();
    let mut engine = engine_with(&Config::default(), &backend, &speech);

    assert!(!engine.submit_message("   \n", None));
    settle().await;

    assert_eq!(engine.mood(), Mood::Idle);
    assert!(engine.history().is_empty());
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_message_round_trip_mood_sequence() {
    let backend = FakeBackend::replying("hi there");
    let speech = ScriptedSpeech::default();
    let mut engine = engine_with(&Config::default(), &backend, &speech);
    let handle = engine.handle();

    assert!(handle.send_message("  hello  ", None));

    let mut moods = vec![engine.mood()];
    for _ in 0..4 {
        drive(&mut engine).await;
        moods.push(engine.mood());
    }
    moods.dedup();

    assert_eq!(
        moods,
        vec![Mood::Idle, Mood::Thinking, Mood::Talking, Mood::Idle]
    );
    assert_eq!(engine.history().len(), 1);
    let turn = engine.history().last().unwrap();
    assert_eq!(turn.outgoing_text, "hello");
    assert_eq!(turn.reply, "hi there");
    assert!(!turn.failed);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].message, "hello");
    assert_eq!(requests[0].mood, "thinking");
    assert_eq!(speech.spoken(), vec!["hi there".to_string()]);

    let stats = engine.stats().stats();
    assert_eq!(stats.round_trips, 1);
    assert_eq!(stats.mood_transitions, 3);
}

#[tokio::test]
async fn test_wave_sends_one_request_with_still() {
    let backend = FakeBackend::hanging();
    let speech = ScriptedSpeech::default();
    let mut config = Config::default();
    config.backend.timeout = Duration::from_secs(120);
    let mut engine = engine_with(&config, &backend, &speech);
    let handle = engine.handle();
    let start = Utc::now();

    // entering from the left edge plus five alternating jumps of 0.2
    for i in 0..7 {
        let x = if i % 2 == 0 { 0.3 } else { 0.5 };
        let tick = PoseResults::new(frame_time(start, i))
            .with_hand(flat_hand(x))
            .with_image(STILL);
        publish_and_drive(&mut engine, &handle, tick).await;
    }
    settle().await;

    assert_eq!(engine.mood(), Mood::Excited);
    assert!(engine.state().round_trip_in_flight);
    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].mood, "excited");
    assert_eq!(requests[0].image_url.as_deref(), Some(STILL));
    assert_eq!(engine.stats().stats().wave_events, 1);

    // past the cooldown the debouncer fires again, but excited + in flight ignores it
    let later = start + ChronoDuration::seconds(4);
    for i in 0..7 {
        let x = if i % 2 == 0 { 0.3 } else { 0.5 };
        let tick = PoseResults::new(frame_time(later, i)).with_hand(flat_hand(x));
        publish_and_drive(&mut engine, &handle, tick).await;
    }
    settle().await;

    assert_eq!(engine.stats().stats().wave_events, 2);
    assert_eq!(backend.requests().len(), 1);
    assert_eq!(engine.mood(), Mood::Excited);
}

#[tokio::test]
async fn test_held_finger_count_sends_prompt() {
    let backend = FakeBackend::hanging();
    let speech = ScriptedSpeech::default();
    let mut config = Config::default();
    config.backend.timeout = Duration::from_secs(120);
    let mut engine = engine_with(&config, &backend, &speech);
    let handle = engine.handle();
    let start = Utc::now();

    // the first frame starts the run; sixteen more repeat it
    for i in 0..16 {
        let tick = PoseResults::new(frame_time(start, i)).with_hand(three_fingers());
        publish_and_drive(&mut engine, &handle, tick).await;
    }
    settle().await;
    assert!(backend.requests().is_empty());

    let tick = PoseResults::new(frame_time(start, 16)).with_hand(three_fingers());
    publish_and_drive(&mut engine, &handle, tick).await;
    settle().await;

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].message.contains('3'));
    assert!(requests[0].image_url.is_none());
    assert_eq!(engine.mood(), Mood::Idle);
    assert!(engine.state().round_trip_in_flight);
}

#[tokio::test]
async fn test_network_failure_records_error_turn() {
    let backend = FakeBackend::failing();
    let speech = ScriptedSpeech::default();
    let mut engine = engine_with(&Config::default(), &backend, &speech);
    let handle = engine.handle();

    handle.send_message("hello", None);
    drive(&mut engine).await;
    assert_eq!(engine.mood(), Mood::Thinking);
    drive(&mut engine).await;

    assert_eq!(engine.mood(), Mood::Idle);
    assert!(!engine.state().round_trip_in_flight);
    let turn = engine.history().last().unwrap();
    assert_eq!(turn.reply, NETWORK_ERROR_REPLY);
    assert!(turn.failed);
    assert!(speech.spoken().is_empty());
    assert_eq!(engine.stats().stats().failed_round_trips, 1);

    // nothing left to process: no speech signals were produced
    assert!(
        tokio::time::timeout(Duration::from_millis(50), engine.step())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_round_trip_timeout_is_a_network_failure() {
    let backend = FakeBackend {
        delay: Duration::from_secs(10),
        ..FakeBackend::replying("too late")
    };
    let speech = ScriptedSpeech::default();
    let mut config = Config::default();
    config.backend.timeout = Duration::from_millis(50);
    let mut engine = engine_with(&config, &backend, &speech);

    assert!(engine.submit_message("hello", None));
    drive(&mut engine).await;

    assert_eq!(engine.mood(), Mood::Idle);
    assert_eq!(engine.history().last().unwrap().reply, NETWORK_ERROR_REPLY);
    assert!(speech.spoken().is_empty());
}

#[tokio::test]
async fn test_message_dropped_while_round_trip_in_flight() {
    let backend = FakeBackend::hanging();
    let speech = ScriptedSpeech::default();
    let mut config = Config::default();
    config.backend.timeout = Duration::from_secs(120);
    let mut engine = engine_with(&config, &backend, &speech);
    let handle = engine.handle();

    handle.send_message("first", None);
    drive(&mut engine).await;
    handle.send_message("second", None);
    drive(&mut engine).await;
    settle().await;

    assert!(!engine.submit_message("third", None));
    assert_eq!(backend.requests().len(), 1);
    assert_eq!(backend.requests()[0].message, "first");
    assert!(engine.history().is_empty());
    assert_eq!(engine.mood(), Mood::Thinking);
}

#[tokio::test]
async fn test_speech_failure_returns_to_idle() {
    let backend = FakeBackend::replying("hi there");
    let speech = ScriptedSpeech {
        fail: true,
        ..ScriptedSpeech::default()
    };
    let mut engine = engine_with(&Config::default(), &backend, &speech);

    engine.submit_message("hello", None);
    drive(&mut engine).await;
    assert_eq!(engine.mood(), Mood::Thinking);
    drive(&mut engine).await;
    assert_eq!(speech.spoken(), vec!["hi there".to_string()]);
    drive(&mut engine).await;

    assert_eq!(engine.mood(), Mood::Idle);
    assert_eq!(engine.history().len(), 1);
}

#[tokio::test]
async fn test_renderer_sees_published_moods() {
    let backend = FakeBackend::hanging();
    let speech = ScriptedSpeech::default();
    let mut config = Config::default();
    config.backend.timeout = Duration::from_secs(120);
    let mut engine = engine_with(&config, &backend, &speech);
    let handle = engine.handle();
    let mut renderer = handle.subscribe();

    handle.send_message("hello", None);
    drive(&mut engine).await;

    assert!(renderer.has_changed().unwrap());
    assert_eq!(*renderer.borrow_and_update(), Mood::Thinking);
    assert_eq!(handle.mood(), Mood::Thinking);
}

#[tokio::test]
async fn test_shutdown_stops_run() {
    let backend = FakeBackend::replying("hi there");
    let speech = ScriptedSpeech::default();
    let mut engine = engine_with(&Config::default(), &backend, &speech);
    let handle = engine.handle();

    handle.send_message("hello", None);
    handle.shutdown();

    tokio::time::timeout(Duration::from_secs(2), engine.run())
        .await
        .expect("engine did not stop");
    assert!(engine.state().round_trip_in_flight);
}
