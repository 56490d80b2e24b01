//! Event debouncing: stability windows and per-kind cooldowns.
//!
//! The debouncer owns every counter that spans frames: the wave detectors'
//! jump tallies, the finger-count stability runs and the cooldown timers.
//! Cooldowns are checked against the frame timestamp, so the caller supplies
//! the clock.

use crate::config::{GestureConfig, StateScope};
use crate::gesture::classifier::{FingerCountDetector, GestureKind, GestureSignal, WaveDetector};
use crate::pose::types::LandmarkFrame;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Self-expiring quiet period for one gesture kind.
#[derive(Debug, Clone)]
pub struct Cooldown {
    duration: Duration,
    armed_until: Option<DateTime<Utc>>,
}

impl Cooldown {
    /// Durations beyond chrono's range saturate instead of disabling the cooldown.
    pub fn new(duration: std::time::Duration) -> Self {
        Self {
            duration: Duration::from_std(duration).unwrap_or(Duration::MAX),
            armed_until: None,
        }
    }

    /// Whether the cooldown still blocks emission at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.armed_until.map(|until| now < until).unwrap_or(false)
    }

    /// Start the quiet period at `now`.
    pub fn arm(&mut self, now: DateTime<Utc>) {
        let until = now
            .checked_add_signed(self.duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.armed_until = Some(until);
    }

    pub fn armed_until(&self) -> Option<DateTime<Utc>> {
        self.armed_until
    }
}

/// What a confirmed gesture carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GesturePayload {
    Wave,
    FingerCount { count: u8 },
}

/// A confirmed, debounced gesture occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureEvent {
    #[serde(flatten)]
    pub payload: GesturePayload,
    pub emitted_at: DateTime<Utc>,
}

impl GestureEvent {
    pub fn kind(&self) -> GestureKind {
        match self.payload {
            GesturePayload::Wave => GestureKind::Wave,
            GesturePayload::FingerCount { .. } => GestureKind::FingerCount,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct FingerStability {
    last_count: u8,
    stability: u32,
}

/// Running state for one tracked hand slot.
#[derive(Debug, Clone)]
struct HandTrack {
    wave: WaveDetector,
    fingers: FingerStability,
}

impl HandTrack {
    fn new(threshold: f64) -> Self {
        Self {
            wave: WaveDetector::new(threshold),
            fingers: FingerStability::default(),
        }
    }
}

/// Turns per-frame classifier output into rate-limited gesture events.
pub struct EventDebouncer {
    config: GestureConfig,
    tracks: Vec<HandTrack>,
    wave_cooldown: Cooldown,
    finger_cooldown: Cooldown,
}

impl EventDebouncer {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            config: config.clone(),
            tracks: Vec::new(),
            wave_cooldown: Cooldown::new(config.wave_cooldown),
            finger_cooldown: Cooldown::new(config.finger_cooldown),
        }
    }

    /// Process every hand detected in one tick.
    ///
    /// An empty slice means no hand is visible; any stability run in progress
    /// is lost.
    pub fn process_hands(
        &mut self,
        hands: &[LandmarkFrame],
        timestamp: DateTime<Utc>,
    ) -> Vec<GestureEvent> {
        let mut events = Vec::new();

        for (index, frame) in hands.iter().enumerate() {
            let slot = self.slot_for(index);
            events.extend(self.process_hand(slot, frame, timestamp));
        }

        match self.config.scope {
            StateScope::Shared => {
                if hands.is_empty() {
                    self.hand_lost(0);
                }
            }
            StateScope::PerHand => {
                for slot in hands.len()..self.tracks.len() {
                    self.hand_lost(slot);
                }
            }
        }

        events
    }

    fn process_hand(
        &mut self,
        slot: usize,
        frame: &LandmarkFrame,
        timestamp: DateTime<Utc>,
    ) -> Vec<GestureEvent> {
        let mut events = Vec::new();

        if let Some(signal) = self.track_mut(slot).wave.classify(frame, timestamp) {
            events.extend(self.debounce_wave(slot, signal));
        }

        if self.config.finger_count_enabled {
            match FingerCountDetector::classify(frame, timestamp) {
                Some(signal) => events.extend(self.debounce_fingers(slot, signal)),
                None => self.hand_lost(slot),
            }
        }

        events
    }

    fn debounce_wave(&mut self, slot: usize, signal: GestureSignal) -> Option<GestureEvent> {
        let now = signal.frame_timestamp;
        if signal.value <= self.config.wave_trigger_count || self.wave_cooldown.is_active(now) {
            return None;
        }

        self.track_mut(slot).wave.reset_count();
        self.wave_cooldown.arm(now);
        debug!("Wave detected on hand slot {slot}");

        Some(GestureEvent {
            payload: GesturePayload::Wave,
            emitted_at: now,
        })
    }

    fn debounce_fingers(&mut self, slot: usize, signal: GestureSignal) -> Option<GestureEvent> {
        let now = signal.frame_timestamp;
        let count = signal.value.min(5) as u8;
        let stability_frames = self.config.finger_stability_frames;

        let fingers = &mut self.track_mut(slot).fingers;
        if count == fingers.last_count && count != 0 {
            fingers.stability += 1;
        } else {
            fingers.stability = 0;
            fingers.last_count = count;
        }
        let stability = fingers.stability;

        if stability <= stability_frames || self.finger_cooldown.is_active(now) {
            return None;
        }

        self.track_mut(slot).fingers.stability = 0;
        self.finger_cooldown.arm(now);
        debug!("Finger count {count} held on hand slot {slot}");

        Some(GestureEvent {
            payload: GesturePayload::FingerCount { count },
            emitted_at: now,
        })
    }

    /// Forget the stability run for a slot whose hand disappeared.
    fn hand_lost(&mut self, slot: usize) {
        if let Some(track) = self.tracks.get_mut(slot) {
            track.fingers.stability = 0;
        }
    }

    fn slot_for(&self, index: usize) -> usize {
        match self.config.scope {
            StateScope::Shared => 0,
            StateScope::PerHand => index,
        }
    }

    fn track_mut(&mut self, slot: usize) -> &mut HandTrack {
        while self.tracks.len() <= slot {
            self.tracks
                .push(HandTrack::new(self.config.wave_movement_threshold));
        }
        &mut self.tracks[slot]
    }

    /// Current jump tally for a slot.
    pub fn wave_count(&self, slot: usize) -> u32 {
        self.tracks.get(slot).map(|t| t.wave.wave_count()).unwrap_or(0)
    }

    /// Current stability run for a slot.
    pub fn finger_stability(&self, slot: usize) -> u32 {
        self.tracks
            .get(slot)
            .map(|t| t.fingers.stability)
            .unwrap_or(0)
    }

    /// Whether emission for `kind` is blocked at `now`.
    pub fn is_cooling_down(&self, kind: GestureKind, now: DateTime<Utc>) -> bool {
        match kind {
            GestureKind::Wave => self.wave_cooldown.is_active(now),
            GestureKind::FingerCount => self.finger_cooldown.is_active(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::classifier::fixtures::hand;
    use proptest::prelude::*;

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn frame_time(frame: i64) -> DateTime<Utc> {
        start() + Duration::milliseconds(frame * 33)
    }

    fn wave_only() -> GestureConfig {
        GestureConfig {
            finger_count_enabled: false,
            ..GestureConfig::default()
        }
    }

    #[test]
    fn test_cooldown_expires() {
        let mut cooldown = Cooldown::new(std::time::Duration::from_secs(3));
        assert!(!cooldown.is_active(start()));

        cooldown.arm(start());
        assert!(cooldown.is_active(start() + Duration::milliseconds(2999)));
        assert!(!cooldown.is_active(start() + Duration::seconds(3)));
    }

    #[test]
    fn test_oversized_cooldown_saturates() {
        let mut cooldown = Cooldown::new(std::time::Duration::MAX);
        cooldown.arm(start());
        assert!(cooldown.is_active(start() + Duration::days(365 * 1000)));
        assert_eq!(cooldown.armed_until(), Some(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_six_jumps_emit_one_wave() {
        let mut debouncer = EventDebouncer::new(&wave_only());
        let mut events = Vec::new();

        // the entry from the left edge is the first jump, five alternations follow
        for frame in 0..6 {
            let x = if frame % 2 == 0 { 0.5 } else { 0.3 };
            events.extend(debouncer.process_hands(&[hand(x, 0)], frame_time(frame)));
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, GesturePayload::Wave);
        assert_eq!(events[0].emitted_at, frame_time(5));
        assert_eq!(debouncer.wave_count(0), 0);
        assert!(debouncer.is_cooling_down(GestureKind::Wave, frame_time(6)));
    }

    #[test]
    fn test_five_jumps_do_not_emit() {
        let mut debouncer = EventDebouncer::new(&wave_only());
        let mut events = Vec::new();
        for frame in 0..5 {
            let x = if frame % 2 == 0 { 0.5 } else { 0.3 };
            events.extend(debouncer.process_hands(&[hand(x, 0)], frame_time(frame)));
        }
        assert!(events.is_empty());
        assert_eq!(debouncer.wave_count(0), 5);
    }

    #[test]
    fn test_wave_suppressed_during_cooldown_then_fires() {
        let mut debouncer = EventDebouncer::new(&wave_only());
        let mut emitted = Vec::new();

        // continuous waving for five seconds
        for frame in 0..150 {
            let x = if frame % 2 == 0 { 0.3 } else { 0.5 };
            for event in debouncer.process_hands(&[hand(x, 0)], frame_time(frame)) {
                emitted.push(event.emitted_at);
            }
        }

        assert_eq!(emitted.len(), 2);
        assert!(emitted[1] - emitted[0] >= Duration::seconds(3));
    }

    fn hold_fingers(
        debouncer: &mut EventDebouncer,
        count: u8,
        frames: std::ops::Range<i64>,
    ) -> Vec<GestureEvent> {
        frames
            .flat_map(|frame| debouncer.process_hands(&[hand(0.5, count)], frame_time(frame)))
            .filter(|e| e.kind() == GestureKind::FingerCount)
            .collect()
    }

    #[test]
    fn test_finger_count_needs_more_than_fifteen_repeats() {
        let mut debouncer = EventDebouncer::new(&GestureConfig::default());

        // first frame sets last_count, then 15 repeats bring stability to 15
        assert!(hold_fingers(&mut debouncer, 3, 0..16).is_empty());
        assert_eq!(debouncer.finger_stability(0), 15);

        let events = hold_fingers(&mut debouncer, 3, 16..17);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, GesturePayload::FingerCount { count: 3 });
        assert_eq!(debouncer.finger_stability(0), 0);
    }

    #[test]
    fn test_finger_change_resets_stability() {
        let mut debouncer = EventDebouncer::new(&GestureConfig::default());

        hold_fingers(&mut debouncer, 2, 0..10);
        assert_eq!(debouncer.finger_stability(0), 9);
        hold_fingers(&mut debouncer, 4, 10..11);
        assert_eq!(debouncer.finger_stability(0), 0);
        assert!(hold_fingers(&mut debouncer, 4, 11..26).is_empty());
        assert_eq!(hold_fingers(&mut debouncer, 4, 26..27).len(), 1);
    }

    #[test]
    fn test_closed_fist_never_emits() {
        let mut debouncer = EventDebouncer::new(&GestureConfig::default());
        assert!(hold_fingers(&mut debouncer, 0, 0..100).is_empty());
        assert_eq!(debouncer.finger_stability(0), 0);
    }

    #[test]
    fn test_hand_disappearing_resets_stability() {
        let mut debouncer = EventDebouncer::new(&GestureConfig::default());

        hold_fingers(&mut debouncer, 5, 0..12);
        assert_eq!(debouncer.finger_stability(0), 11);

        debouncer.process_hands(&[], frame_time(12));
        assert_eq!(debouncer.finger_stability(0), 0);
    }

    #[test]
    fn test_finger_cooldown_blocks_second_event() {
        let mut debouncer = EventDebouncer::new(&GestureConfig::default());

        // 4 s cooldown is about 121 frames at 33 ms
        let events = hold_fingers(&mut debouncer, 2, 0..150);
        assert_eq!(events.len(), 2);
        assert!(events[1].emitted_at - events[0].emitted_at >= Duration::seconds(4));
    }

    #[test]
    fn test_shared_scope_mixes_hands() {
        let mut debouncer = EventDebouncer::new(&wave_only());
        let mut events = Vec::new();

        // two still hands far apart look like constant jumps to shared state
        for frame in 0..4 {
            events.extend(
                debouncer.process_hands(&[hand(0.2, 0), hand(0.8, 0)], frame_time(frame)),
            );
        }
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_per_hand_scope_keeps_hands_apart() {
        let config = GestureConfig {
            scope: StateScope::PerHand,
            ..GestureConfig::default()
        };
        let mut debouncer = EventDebouncer::new(&config);

        for frame in 0..20 {
            let events =
                debouncer.process_hands(&[hand(0.2, 2), hand(0.8, 3)], frame_time(frame));
            assert!(events.iter().all(|e| e.kind() != GestureKind::Wave));
        }
        // each still hand only counted its entry jump
        assert_eq!(debouncer.wave_count(0), 1);
        assert_eq!(debouncer.wave_count(1), 1);
        // slot 0 emitted at frame 16 and was reset; slot 1 was blocked by the cooldown
        assert_eq!(debouncer.finger_stability(0), 3);
        assert_eq!(debouncer.finger_stability(1), 19);

        // second hand leaves: only its run is lost
        debouncer.process_hands(&[hand(0.2, 2)], frame_time(20));
        assert_eq!(debouncer.finger_stability(0), 4);
        assert_eq!(debouncer.finger_stability(1), 0);
    }

    proptest! {
        #[test]
        fn wave_events_respect_cooldown(
            xs in proptest::collection::vec(0.0f64..1.0, 1..400),
        ) {
            let mut debouncer = EventDebouncer::new(&wave_only());
            let mut last: Option<DateTime<Utc>> = None;
            for (frame, x) in xs.iter().enumerate() {
                for event in debouncer.process_hands(&[hand(*x, 0)], frame_time(frame as i64)) {
                    if let Some(prev) = last {
                        prop_assert!(event.emitted_at - prev >= Duration::seconds(3));
                    }
                    last = Some(event.emitted_at);
                }
            }
        }

        #[test]
        fn finger_events_follow_stable_runs(
            counts in proptest::collection::vec(0u8..=5, 1..400),
        ) {
            let mut debouncer = EventDebouncer::new(&GestureConfig::default());
            let mut last: Option<DateTime<Utc>> = None;
            for (frame, count) in counts.iter().enumerate() {
                let events = debouncer.process_hands(&[hand(0.5, *count)], frame_time(frame as i64));
                for event in events.iter().filter(|e| e.kind() == GestureKind::FingerCount) {
                    // the emitting frame and the 16 before it all show the same nonzero count
                    prop_assert!(frame >= 16);
                    prop_assert!(*count != 0);
                    prop_assert!(counts[frame - 16..=frame].iter().all(|c| c == count));
                    prop_assert_eq!(event.payload, GesturePayload::FingerCount { count: *count });
                    if let Some(prev) = last {
                        prop_assert!(event.emitted_at - prev >= Duration::seconds(4));
                    }
                    last = Some(event.emitted_at);
                }
            }
        }
    }
}
