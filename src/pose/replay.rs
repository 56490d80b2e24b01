//! Replay pose source: plays recorded landmark ticks into a frame buffer.
//!
//! Recordings are JSON Lines files, one [`PoseResults`] per line. Playback
//! runs on a background thread at a fixed frame rate and stamps each tick
//! with the wall-clock time it is published, like a live camera would.

use crate::pose::buffer::SharedFrameBuffer;
use crate::pose::types::PoseResults;
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Playback configuration.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Frames published per second
    pub fps: u32,
    /// Restart from the first tick after the last one
    pub loop_playback: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            loop_playback: false,
        }
    }
}

impl ReplayConfig {
    fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.fps.max(1)))
    }
}

/// Errors from loading or running a recording.
#[derive(Debug)]
pub enum ReplayError {
    Io(String),
    Parse { line: usize, message: String },
    Empty,
    AlreadyRunning,
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::Io(msg) => write!(f, "Recording IO error: {msg}"),
            ReplayError::Parse { line, message } => {
                write!(f, "Recording parse error on line {line}: {message}")
            }
            ReplayError::Empty => write!(f, "Recording contains no frames"),
            ReplayError::AlreadyRunning => write!(f, "Replay is already running"),
        }
    }
}

impl std::error::Error for ReplayError {}

/// Parse a JSON Lines recording. Blank lines are skipped.
pub fn parse_recording(content: &str) -> Result<Vec<PoseResults>, ReplayError> {
    let mut ticks = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let tick: PoseResults = serde_json::from_str(line).map_err(|e| ReplayError::Parse {
            line: idx + 1,
            message: e.to_string(),
        })?;
        ticks.push(tick);
    }
    if ticks.is_empty() {
        return Err(ReplayError::Empty);
    }
    Ok(ticks)
}

/// Background replay of a recording into a frame buffer.
pub struct ReplaySource {
    config: ReplayConfig,
    ticks: Arc<Vec<PoseResults>>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ReplaySource {
    /// Create a replay source from already-parsed ticks.
    pub fn new(ticks: Vec<PoseResults>, config: ReplayConfig) -> Self {
        Self {
            config,
            ticks: Arc::new(ticks),
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Load a recording from disk.
    pub fn from_path(path: &Path, config: ReplayConfig) -> Result<Self, ReplayError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReplayError::Io(format!("{}: {e}", path.display())))?;
        Ok(Self::new(parse_recording(&content)?, config))
    }

    /// Number of ticks in the recording.
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Start publishing ticks into `buffer` on a background thread.
    pub fn start(&mut self, buffer: SharedFrameBuffer) -> Result<(), ReplayError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(ReplayError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        let ticks = Arc::clone(&self.ticks);
        let running = Arc::clone(&self.running);
        let interval = self.config.frame_interval();
        let loop_playback = self.config.loop_playback;

        let handle = thread::spawn(move || {
            'playback: loop {
                for tick in ticks.iter() {
                    if !running.load(Ordering::SeqCst) {
                        break 'playback;
                    }
                    let mut tick = tick.clone();
                    tick.timestamp = Utc::now();
                    buffer.publish(tick);
                    thread::sleep(interval);
                }
                if !loop_playback {
                    break;
                }
            }
            tracing::debug!("Replay finished");
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop playback and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Check if playback is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
    }
}
