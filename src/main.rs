//! Companion Engine CLI
//!
//! Gesture-driven chat companion running in the terminal.

use chrono::Utc;
use clap::{Parser, Subcommand};
use companion_engine::{
    backend::{encode_image_data_url, image_mime_for},
    pose::{ReplayConfig, ReplaySource},
    stats::{create_shared_log_with_persistence, SharedActivityLog},
    ChatBackend, ChatHistory, ChatRequest, Config, ConsoleSpeech, ConversationSession, Engine,
    HttpChatBackend, Mood, StateScope, CAMERA_NOTICE, NETWORK_ERROR_REPLY, VERSION,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "server")]
use companion_engine::{
    server::{self, ServerConfig},
    RelaySpeech,
};

#[derive(Parser)]
#[command(name = "companion")]
#[command(version = VERSION)]
#[command(about = "Gesture-driven animated chat companion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the companion: replay recorded landmarks and chat from stdin
    Run {
        /// JSON Lines recording of pose results to replay
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Replay frame rate
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Restart the recording when it ends
        #[arg(long = "loop")]
        loop_playback: bool,

        /// Chat backend URL (overrides config)
        #[arg(long)]
        backend: Option<String>,

        /// Keep separate gesture counters for each visible hand
        #[arg(long)]
        per_hand: bool,

        /// Disable finger counting
        #[arg(long)]
        no_finger_count: bool,
    },

    /// Send a single message to the chat backend
    Chat {
        /// Message text
        message: String,

        /// Image file sent along with the message
        #[arg(long)]
        image: Option<PathBuf>,

        /// Mood reported to the backend
        #[arg(long, default_value = "idle")]
        mood: String,

        /// Chat backend URL (overrides config)
        #[arg(long)]
        backend: Option<String>,
    },

    /// Serve pose ingestion and mood polling over HTTP
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8787")]
        port: u16,

        /// Chat backend URL (overrides config)
        #[arg(long)]
        backend: Option<String>,
    },

    /// Show configuration and cumulative activity
    Status,

    /// Display the camera notice
    Privacy,

    /// Show configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            frames,
            fps,
            loop_playback,
            backend,
            per_hand,
            no_finger_count,
        } => {
            cmd_run(
                frames,
                ReplayConfig { fps, loop_playback },
                backend,
                per_hand,
                no_finger_count,
            )
            .await;
        }
        Commands::Chat {
            message,
            image,
            mood,
            backend,
        } => {
            cmd_chat(&message, image, &mood, backend).await;
        }
        #[cfg(feature = "server")]
        Commands::Serve { port, backend } => {
            cmd_serve(port, backend).await;
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Privacy => {
            cmd_privacy();
        }
        Commands::Config { init } => {
            cmd_config(init);
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(backend: Option<String>) -> Config {
    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    if let Some(url) = backend {
        config.backend.url = url;
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    config
}

fn create_backend(config: &Config) -> HttpChatBackend {
    match HttpChatBackend::new(config.backend.clone()) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn cmd_run(
    frames: Option<PathBuf>,
    replay_config: ReplayConfig,
    backend: Option<String>,
    per_hand: bool,
    no_finger_count: bool,
) {
    println!("Companion Engine v{VERSION}");
    println!();

    let mut config = load_config(backend);
    if per_hand {
        config.gesture.scope = StateScope::PerHand;
    }
    if no_finger_count {
        config.gesture.finger_count_enabled = false;
    }

    println!("  Chat backend: {}", config.backend.url);
    println!(
        "  Finger counting: {}",
        if config.gesture.finger_count_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Gesture scope: {:?}", config.gesture.scope);

    let stats = create_shared_log_with_persistence(config.data_path.join("activity.json"));
    let speech = ConsoleSpeech::new(config.speech.words_per_minute);
    let mut engine = Engine::new(
        &config,
        create_backend(&config),
        speech,
        Arc::clone(&stats),
    );
    let handle = engine.handle();

    let mut replay = match frames {
        Some(path) => match start_replay(&path, replay_config, &handle) {
            Ok(source) => {
                println!("  Replaying {} frames from {path:?}", source.len());
                Some(source)
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("  No recording given; gestures are idle");
            None
        }
    };

    println!();
    println!("Type a message and press Enter. Press Ctrl+C to stop.");
    println!();

    let mut renderer = handle.subscribe();
    tokio::spawn(async move {
        while renderer.changed().await.is_ok() {
            let mood = *renderer.borrow_and_update();
            print_mood(mood);
        }
    });

    let input = handle.clone();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if !input.send_message(line, None) {
                break;
            }
        }
    });

    let interrupt = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || interrupt.shutdown()) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }

    engine.run().await;

    if let Some(source) = replay.as_mut() {
        source.stop();
    }

    println!();
    print_history(engine.history());
    export_history(engine.history(), &config.data_path);
    finish(&stats);
}

fn start_replay(
    path: &Path,
    config: ReplayConfig,
    handle: &companion_engine::EngineHandle,
) -> Result<ReplaySource, companion_engine::pose::ReplayError> {
    let mut source = ReplaySource::from_path(path, config)?;
    source.start(Arc::clone(handle.frames()))?;
    Ok(source)
}

fn print_mood(mood: Mood) {
    let target = mood.visual_target();
    let animation = match target.loop_period_ms {
        Some(period) => format!("loop {period}ms"),
        None if target.blinks => "blinking".to_string(),
        None => "still".to_string(),
    };
    println!(
        "[{mood}] pupils x{:.1}, offset {:+.0}px, {animation}",
        target.pupil_scale, target.offset_y
    );
}

fn print_history(history: &ChatHistory) {
    if history.is_empty() {
        return;
    }
    println!("Conversation ({} turns):", history.len());
    for turn in history.iter() {
        println!("  you:       {}", turn.display_label);
        println!("  companion: {}", turn.reply);
    }
    println!();
}

fn export_history(history: &ChatHistory, data_path: &Path) {
    if history.is_empty() {
        return;
    }
    let path = data_path.join(format!(
        "history_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    let result = history
        .to_json()
        .map_err(std::io::Error::other)
        .and_then(|json| std::fs::write(&path, json));
    match result {
        Ok(_) => println!("History exported to {path:?}"),
        Err(e) => eprintln!("Error writing history: {e}"),
    }
}

fn finish(stats: &SharedActivityLog) {
    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save activity stats: {e}");
    }
    println!("{}", stats.summary());
}

async fn cmd_chat(message: &str, image: Option<PathBuf>, mood: &str, backend: Option<String>) {
    let mood: Mood = match mood.parse() {
        Ok(mood) => mood,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let image_url = match image {
        Some(path) => match std::fs::read(&path) {
            Ok(bytes) => {
                let extension = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default();
                Some(encode_image_data_url(&bytes, image_mime_for(extension)))
            }
            Err(e) => {
                eprintln!("Error reading {path:?}: {e}");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let Some(text) = ConversationSession::normalize_input(message, image_url.as_deref()) else {
        eprintln!("Nothing to send.");
        std::process::exit(1);
    };

    let config = load_config(backend);
    let backend = create_backend(&config);
    let request = ChatRequest {
        message: text,
        mood: mood.as_str().to_string(),
        image_url,
    };

    match backend.send(request).await {
        Ok(response) => println!("{}", response.response),
        Err(e) => {
            eprintln!("{e}");
            println!("{NETWORK_ERROR_REPLY}");
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "server")]
async fn cmd_serve(port: u16, backend: Option<String>) {
    println!("Companion Engine v{VERSION}");
    println!();

    let config = load_config(backend);
    let stats = create_shared_log_with_persistence(config.data_path.join("activity.json"));
    let (speech, utterances) = RelaySpeech::new();
    let mut engine = Engine::new(
        &config,
        create_backend(&config),
        speech,
        Arc::clone(&stats),
    );
    let handle = engine.handle();

    let (addr, shutdown_tx) =
        match server::run(ServerConfig::new(port), handle.clone(), utterances).await {
            Ok(started) => started,
            Err(e) => {
                eprintln!("Error starting server: {e}");
                std::process::exit(1);
            }
        };

    println!("  Listening on http://{addr}");
    println!("  Chat backend: {}", config.backend.url);
    println!();
    println!("Press Ctrl+C to stop.");

    let interrupt = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || interrupt.shutdown()) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }

    engine.run().await;
    let _ = shutdown_tx.send(());

    println!();
    export_history(engine.history(), &config.data_path);
    finish(&stats);
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Companion Engine Status");
    println!("=======================");
    println!();

    println!("Configuration:");
    println!("  Chat backend: {}", config.backend.url);
    println!(
        "  Round-trip timeout: {}s",
        config.backend.timeout.as_secs()
    );
    println!(
        "  Wave: {} jumps over {:.2}, cooldown {}s",
        config.gesture.wave_trigger_count + 1,
        config.gesture.wave_movement_threshold,
        config.gesture.wave_cooldown.as_secs()
    );
    println!(
        "  Finger count: {} ({} stable frames, cooldown {}s)",
        if config.gesture.finger_count_enabled {
            "enabled"
        } else {
            "disabled"
        },
        config.gesture.finger_stability_frames + 1,
        config.gesture.finger_cooldown.as_secs()
    );
    println!("  Gesture scope: {:?}", config.gesture.scope);
    println!();

    let stats_path = config.data_path.join("activity.json");
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for (key, label) in [
                    ("frames_processed", "Frames processed"),
                    ("wave_events", "Wave gestures"),
                    ("finger_events", "Finger-count gestures"),
                    ("round_trips", "Chat round-trips"),
                    ("failed_round_trips", "Failed round-trips"),
                    ("mood_transitions", "Mood changes"),
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {label}: {value}");
                    }
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_privacy() {
    println!("{CAMERA_NOTICE}");
}

fn cmd_config(init: bool) {
    let config = if init {
        let config = Config::default();
        if let Err(e) = config.save() {
            eprintln!("Error saving config: {e}");
            std::process::exit(1);
        }
        println!("Wrote default configuration.");
        config
    } else {
        Config::load().unwrap_or_default()
    };

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}
