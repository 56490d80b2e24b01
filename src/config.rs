//! Configuration for the companion engine.

use crate::backend::BackendConfig;
use crate::mood::Prompts;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat backend endpoint and timeout
    pub backend: BackendConfig,

    /// Gesture thresholds and cooldowns
    pub gesture: GestureConfig,

    /// Console speech settings
    pub speech: SpeechConfig,

    /// Messages sent on behalf of gestures
    pub prompts: Prompts,

    /// Path for activity stats and exported chat history
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("companion-engine");

        Self {
            backend: BackendConfig::default(),
            gesture: GestureConfig::default(),
            speech: SpeechConfig::default(),
            prompts: Prompts::default(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("companion-engine")
            .join("config.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// How gesture counters are partitioned when several hands are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateScope {
    /// One set of counters fed by every visible hand.
    #[default]
    Shared,
    /// Counters per hand slot, in the order the pose source lists hands.
    PerHand,
}

/// Thresholds for the gesture classifiers and debouncer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Minimum lateral wrist jump (normalized units) counted towards a wave
    pub wave_movement_threshold: f64,
    /// A wave fires once the jump tally exceeds this
    pub wave_trigger_count: u32,
    /// Quiet period after a wave event
    #[serde(with = "duration_serde")]
    pub wave_cooldown: Duration,
    /// A finger count fires once its stability exceeds this many frames
    pub finger_stability_frames: u32,
    /// Quiet period after a finger-count event
    #[serde(with = "duration_serde")]
    pub finger_cooldown: Duration,
    /// Whether finger counting is active at all
    pub finger_count_enabled: bool,
    /// Counter partitioning across hands
    pub scope: StateScope,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            wave_movement_threshold: 0.05,
            wave_trigger_count: 5,
            wave_cooldown: Duration::from_secs(3),
            finger_stability_frames: 15,
            finger_cooldown: Duration::from_secs(4),
            finger_count_enabled: true,
            scope: StateScope::Shared,
        }
    }
}

/// Settings for the console speech engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Simulated speaking rate used to estimate playback length
    pub words_per_minute: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 180,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, stored as milliseconds.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
