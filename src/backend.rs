//! Chat backend client.
//!
//! The backend is a plain request/response endpoint: it receives the user's
//! message, the companion's current mood and an optional camera still, and
//! answers with the companion's reply.

use crate::config::duration_serde;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Chat backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Full URL of the chat endpoint
    pub url: String,
    /// Upper bound on one round-trip
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/chat".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

/// Backend error types. Every variant is a network failure to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Connection or transport failure
    Network(String),
    /// No answer within the configured bound
    Timeout(Duration),
    /// Server returned a non-success status
    Server { status: u16, message: String },
    /// Response body could not be decoded
    Serialization(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Network(msg) => write!(f, "Chat backend network error: {msg}"),
            BackendError::Timeout(after) => {
                write!(f, "Chat backend timed out after {}ms", after.as_millis())
            }
            BackendError::Server { status, message } => {
                write!(f, "Chat backend error ({status}): {message}")
            }
            BackendError::Serialization(msg) => {
                write!(f, "Chat backend serialization error: {msg}")
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Request body for the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub mood: String,
    /// Camera still as a base64 data URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Response body from the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Anything that can answer a chat request.
pub trait ChatBackend: Send + Sync + 'static {
    fn send(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, BackendError>> + Send;
}

/// Chat backend reached over HTTP.
pub struct HttpChatBackend {
    config: BackendConfig,
    client: reqwest::Client,
}

impl HttpChatBackend {
    /// Create a new HTTP backend client.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}

impl ChatBackend for HttpChatBackend {
    fn send(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, BackendError>> + Send {
        let client = self.client.clone();
        let url = self.config.url.clone();
        let timeout = self.config.timeout;

        async move {
            let response = client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        BackendError::Timeout(timeout)
                    } else {
                        BackendError::Network(e.to_string())
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(BackendError::Server {
                    status: status.as_u16(),
                    message,
                });
            }

            response
                .json::<ChatResponse>()
                .await
                .map_err(|e| BackendError::Serialization(e.to_string()))
        }
    }
}

/// Encode raw image bytes as a data URL the backend accepts.
pub fn encode_image_data_url(bytes: &[u8], mime: &str) -> String {
    format!(
        "data:{mime};base64,{}",
        data_encoding::BASE64.encode(bytes)
    )
}

/// Guess an image MIME type from a file extension.
pub fn image_mime_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}
