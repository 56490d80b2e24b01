//! HTTP surface for browser-hosted pose sources and renderers.
//!
//! This module provides an HTTP server that:
//! - Accepts landmark ticks from a browser pose tracker via POST /pose
//! - Accepts typed messages via POST /message
//! - Accepts lifecycle signals from a browser speech engine via POST /speech
//! - Exposes the current mood and the latest utterance via GET /mood
//!
//! # Architecture
//!
//! ```text
//! Browser tracker ──→ POST /pose ──→ frame buffer ──→ engine ──→ chat backend
//! Browser renderer ←── GET /mood ←── mood watch ←────────┘
//! ```

use crate::engine::EngineHandle;
use crate::mood::{Mood, VisualTarget};
use crate::pose::PoseResults;
use crate::session::ConversationSession;
use crate::speech::{SpeechSignal, Utterance};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Shared server state
struct ServerState {
    engine: EngineHandle,
    utterances: watch::Receiver<Option<Utterance>>,
}

/// Typed message from the browser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Response for accepted input
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedResponse {
    pub status: String,
    pub mood: Mood,
}

/// Current mood and what the renderer should show
#[derive(Debug, Clone, Serialize)]
pub struct MoodResponse {
    pub mood: Mood,
    pub visual: VisualTarget,
    /// Reply the browser speech engine should be speaking, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utterance: Option<Utterance>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn engine_stopped() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "Engine is not running".to_string(),
            code: "ENGINE_STOPPED".to_string(),
        }),
    )
}

fn accepted(state: &ServerState) -> (StatusCode, Json<AcceptedResponse>) {
    (
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted".to_string(),
            mood: state.engine.mood(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /mood
async fn mood(State(state): State<Arc<ServerState>>) -> Json<MoodResponse> {
    let mood = state.engine.mood();
    Json(MoodResponse {
        mood,
        visual: mood.visual_target(),
        utterance: state.utterances.borrow().clone(),
    })
}

/// POST /pose
///
/// Publishes one tick into the latest-only frame buffer.
async fn pose(
    State(state): State<Arc<ServerState>>,
    Json(results): Json<PoseResults>,
) -> (StatusCode, Json<AcceptedResponse>) {
    state.engine.publish_pose(results);
    accepted(&state)
}

/// POST /message
async fn message(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<MessageRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    if ConversationSession::normalize_input(&request.message, request.image_url.as_deref())
        .is_none()
    {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Message is empty".to_string(),
                code: "EMPTY_MESSAGE".to_string(),
            }),
        ));
    }

    if !state
        .engine
        .send_message(request.message, request.image_url)
    {
        return Err(engine_stopped());
    }
    Ok(accepted(&state))
}

/// POST /speech
async fn speech(
    State(state): State<Arc<ServerState>>,
    Json(signal): Json<SpeechSignal>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    if !state.engine.speech_signal(signal) {
        return Err(engine_stopped());
    }
    Ok(accepted(&state))
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    engine: EngineHandle,
    utterances: watch::Receiver<Option<Utterance>>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState { engine, utterances });

    let app = Router::new()
        .route("/health", get(health))
        .route("/mood", get(mood))
        .route("/pose", post(pose))
        .route("/message", post(message))
        .route("/speech", post(speech))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                    // Vite dev server
                    HeaderValue::from_static("http://localhost:5173"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Companion server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
