//! Latest-frame buffer between the pose source and the classification stage.
//!
//! The buffer keeps only the most recent result per entity (hands, faces).
//! A frame that arrives before the previous one was consumed replaces it and
//! is counted as superseded. Nothing is queued.

use crate::pose::types::{LandmarkFrame, PoseResults};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Latest results for one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFrames {
    pub timestamp: DateTime<Utc>,
    pub frames: Vec<LandmarkFrame>,
}

/// What the consumer sees when it drains the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedTick {
    /// Latest hand results, if any arrived since the last take.
    pub hands: Option<EntityFrames>,
    /// Latest face results, if any arrived since the last take.
    pub faces: Option<EntityFrames>,
    /// Frames replaced before they could be consumed since the last take.
    pub superseded: u64,
}

impl BufferedTick {
    /// Timestamp of the freshest entity in this tick.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let hands = self.hands.as_ref().map(|h| h.timestamp);
        let faces = self.faces.as_ref().map(|f| f.timestamp);
        hands.max(faces)
    }
}

#[derive(Debug, Default)]
struct Slots {
    hands: Option<EntityFrames>,
    faces: Option<EntityFrames>,
    latest_image: Option<String>,
    superseded: u64,
    published: u64,
}

/// Shared latest-only buffer of landmark results.
#[derive(Debug, Default)]
pub struct LandmarkFrameBuffer {
    slots: Mutex<Slots>,
    ready: Notify,
}

/// Thread-safe shared frame buffer.
pub type SharedFrameBuffer = Arc<LandmarkFrameBuffer>;

impl LandmarkFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new shared buffer.
    pub fn shared() -> SharedFrameBuffer {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish a full tick (hands, faces and optional still image).
    pub fn publish(&self, results: PoseResults) {
        {
            let mut guard = self.lock();
            let slots = &mut *guard;
            Self::replace(
                &mut slots.hands,
                &mut slots.superseded,
                results.timestamp,
                results.hands,
            );
            Self::replace(
                &mut slots.faces,
                &mut slots.superseded,
                results.timestamp,
                results.faces,
            );
            if results.image.is_some() {
                slots.latest_image = results.image;
            }
            slots.published += 1;
        }
        self.ready.notify_one();
    }

    /// Publish hand results only, as delivered by a hand-only callback.
    pub fn publish_hands(&self, timestamp: DateTime<Utc>, frames: Vec<LandmarkFrame>) {
        {
            let mut slots = self.lock();
            let Slots {
                hands, superseded, ..
            } = &mut *slots;
            Self::replace(hands, superseded, timestamp, frames);
            slots.published += 1;
        }
        self.ready.notify_one();
    }

    /// Publish face results only.
    pub fn publish_faces(&self, timestamp: DateTime<Utc>, frames: Vec<LandmarkFrame>) {
        {
            let mut slots = self.lock();
            let Slots {
                faces, superseded, ..
            } = &mut *slots;
            Self::replace(faces, superseded, timestamp, frames);
            slots.published += 1;
        }
        self.ready.notify_one();
    }

    fn replace(
        slot: &mut Option<EntityFrames>,
        superseded: &mut u64,
        timestamp: DateTime<Utc>,
        frames: Vec<LandmarkFrame>,
    ) {
        if slot.is_some() {
            *superseded += 1;
        }
        *slot = Some(EntityFrames { timestamp, frames });
    }

    /// Take whatever arrived since the last take, if anything did.
    pub fn take(&self) -> Option<BufferedTick> {
        let mut slots = self.lock();
        if slots.hands.is_none() && slots.faces.is_none() {
            return None;
        }
        Some(BufferedTick {
            hands: slots.hands.take(),
            faces: slots.faces.take(),
            superseded: std::mem::take(&mut slots.superseded),
        })
    }

    /// Wait until results are available and take them.
    pub async fn next(&self) -> BufferedTick {
        loop {
            if let Some(tick) = self.take() {
                return tick;
            }
            self.ready.notified().await;
        }
    }

    /// The most recent camera still seen by the buffer.
    pub fn capture_image(&self) -> Option<String> {
        self.lock().latest_image.clone()
    }

    /// Total number of publish calls.
    pub fn published_count(&self) -> u64 {
        self.lock().published
    }
}
