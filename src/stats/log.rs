//! Persistent activity counters.

use crate::gesture::GestureKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Counters for the current run, optionally carried across runs.
#[derive(Debug)]
pub struct ActivityLog {
    /// Ticks taken from the frame buffer
    frames_processed: AtomicU64,
    /// Frames overwritten before anyone read them
    frames_superseded: AtomicU64,
    /// Hand entities seen across all ticks
    hands_seen: AtomicU64,
    /// Face entities seen across all ticks
    faces_seen: AtomicU64,
    wave_events: AtomicU64,
    finger_events: AtomicU64,
    /// Chat round-trips started
    round_trips: AtomicU64,
    /// Chat round-trips that ended in the network error reply
    failed_round_trips: AtomicU64,
    /// Published mood changes
    mood_transitions: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            frames_processed: AtomicU64::new(0),
            frames_superseded: AtomicU64::new(0),
            hands_seen: AtomicU64::new(0),
            faces_seen: AtomicU64::new(0),
            wave_events: AtomicU64::new(0),
            finger_events: AtomicU64::new(0),
            round_trips: AtomicU64::new(0),
            failed_round_trips: AtomicU64::new(0),
            mood_transitions: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that loads from and saves to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("Could not load previous activity stats: {e}");
        }

        log
    }

    /// Record one tick taken from the frame buffer.
    pub fn record_tick(&self, hands: usize, faces: usize, superseded: u64) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.frames_superseded
            .fetch_add(superseded, Ordering::Relaxed);
        self.hands_seen.fetch_add(hands as u64, Ordering::Relaxed);
        self.faces_seen.fetch_add(faces as u64, Ordering::Relaxed);
    }

    pub fn record_gesture(&self, kind: GestureKind) {
        match kind {
            GestureKind::Wave => self.wave_events.fetch_add(1, Ordering::Relaxed),
            GestureKind::FingerCount => self.finger_events.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_round_trip(&self) {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_round_trip(&self) {
        self.failed_round_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mood_transitions(&self, count: u64) {
        self.mood_transitions.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_superseded: self.frames_superseded.load(Ordering::Relaxed),
            hands_seen: self.hands_seen.load(Ordering::Relaxed),
            faces_seen: self.faces_seen.load(Ordering::Relaxed),
            wave_events: self.wave_events.load(Ordering::Relaxed),
            finger_events: self.finger_events.load(Ordering::Relaxed),
            round_trips: self.round_trips.load(Ordering::Relaxed),
            failed_round_trips: self.failed_round_trips.load(Ordering::Relaxed),
            mood_transitions: self.mood_transitions.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Activity Statistics:\n\
             - Frames processed: {}\n\
             - Frames superseded: {}\n\
             - Hands seen: {}\n\
             - Faces seen: {}\n\
             - Wave gestures: {}\n\
             - Finger-count gestures: {}\n\
             - Chat round-trips: {} ({} failed)\n\
             - Mood changes: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - Camera frames are never written to disk\n\
             - Stills leave the device only with a gesture or message you trigger\n\
             - Only counts are retained here",
            stats.frames_processed,
            stats.frames_superseded,
            stats.hands_seen,
            stats.faces_seen,
            stats.wave_events,
            stats.finger_events,
            stats.round_trips,
            stats.failed_round_trips,
            stats.mood_transitions,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                frames_processed: stats.frames_processed,
                frames_superseded: stats.frames_superseded,
                hands_seen: stats.hands_seen,
                faces_seen: stats.faces_seen,
                wave_events: stats.wave_events,
                finger_events: stats.finger_events,
                round_trips: stats.round_trips,
                failed_round_trips: stats.failed_round_trips,
                mood_transitions: stats.mood_transitions,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_processed
                    .store(persisted.frames_processed, Ordering::Relaxed);
                self.frames_superseded
                    .store(persisted.frames_superseded, Ordering::Relaxed);
                self.hands_seen.store(persisted.hands_seen, Ordering::Relaxed);
                self.faces_seen.store(persisted.faces_seen, Ordering::Relaxed);
                self.wave_events
                    .store(persisted.wave_events, Ordering::Relaxed);
                self.finger_events
                    .store(persisted.finger_events, Ordering::Relaxed);
                self.round_trips
                    .store(persisted.round_trips, Ordering::Relaxed);
                self.failed_round_trips
                    .store(persisted.failed_round_trips, Ordering::Relaxed);
                self.mood_transitions
                    .store(persisted.mood_transitions, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.frames_processed,
            &self.frames_superseded,
            &self.hands_seen,
            &self.faces_seen,
            &self.wave_events,
            &self.finger_events,
            &self.round_trips,
            &self.failed_round_trips,
            &self.mood_transitions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of activity statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStats {
    pub frames_processed: u64,
    pub frames_superseded: u64,
    pub hands_seen: u64,
    pub faces_seen: u64,
    pub wave_events: u64,
    pub finger_events: u64,
    pub round_trips: u64,
    pub failed_round_trips: u64,
    pub mood_transitions: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    frames_processed: u64,
    frames_superseded: u64,
    hands_seen: u64,
    faces_seen: u64,
    wave_events: u64,
    finger_events: u64,
    round_trips: u64,
    failed_round_trips: u64,
    mood_transitions: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared activity log.
pub type SharedActivityLog = Arc<ActivityLog>;

pub fn create_shared_log() -> SharedActivityLog {
    Arc::new(ActivityLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedActivityLog {
    Arc::new(ActivityLog::with_persistence(path))
}
