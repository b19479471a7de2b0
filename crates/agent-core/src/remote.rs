//! Remote desktop action client
//!
//! Thin typed wrapper over the remote computer-control REST API: one
//! method per primitive action, bearer-authenticated, bounded timeouts.
//! Failures never escape this boundary; every call returns a
//! [`RemoteResponse`] that callers fold into an observation.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

use crate::config::RemoteConfig;

/// Timeout for light actions (click, type, key, scroll)
const ACTION_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for shell execution on the remote host
const SHELL_TIMEOUT: Duration = Duration::from_secs(120);
/// Timeout for screenshot capture
const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a remote action: a parsed JSON body, or the raw error body.
#[derive(Debug, Clone)]
pub enum RemoteResponse {
    Json(Value),
    Error(String),
}

impl RemoteResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, RemoteResponse::Error(_))
    }

    /// String field from a JSON body, if present.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        match self {
            RemoteResponse::Json(value) => value.get(key).and_then(|v| v.as_str()),
            RemoteResponse::Error(_) => None,
        }
    }

    /// Integer field from a JSON body, if present.
    pub fn field_i64(&self, key: &str) -> Option<i64> {
        match self {
            RemoteResponse::Json(value) => value.get(key).and_then(|v| v.as_i64()),
            RemoteResponse::Error(_) => None,
        }
    }
}

/// Raw screenshot payload before transport resolution
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Client for the remote desktop endpoint
#[derive(Debug, Clone)]
pub struct RemoteClient {
    base_url: String,
    api_key: String,
    computer_id: String,
    client: reqwest::Client,
}

impl RemoteClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SHELL_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            computer_id: config.computer_id.clone(),
            client,
        })
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/computers/{}/{}", self.base_url, self.computer_id, action)
    }

    /// POST a JSON body to an action endpoint, absorbing all failures.
    async fn post(&self, action: &str, body: Value, timeout: Duration) -> RemoteResponse {
        let url = self.action_url(action);

        let result = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(action, error = %e, "Remote request failed");
                return RemoteResponse::Error(e.to_string());
            }
        };

        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(action, %status, "Remote endpoint returned error");
            return RemoteResponse::Error(body_text);
        }

        match serde_json::from_str(&body_text) {
            Ok(value) => RemoteResponse::Json(value),
            // Some endpoints answer with plain text on success
            Err(_) => RemoteResponse::Json(json!({ "output": body_text })),
        }
    }

    /// Execute a shell command on the remote host.
    pub async fn bash(&self, command: &str) -> RemoteResponse {
        self.post("bash", json!({ "command": command }), SHELL_TIMEOUT)
            .await
    }

    /// Click at screen coordinates.
    pub async fn click(&self, x: i64, y: i64, button: &str) -> RemoteResponse {
        self.post(
            "click",
            json!({ "x": x, "y": y, "button": button }),
            ACTION_TIMEOUT,
        )
        .await
    }

    /// Type text where focus currently is.
    pub async fn type_text(&self, text: &str) -> RemoteResponse {
        self.post("type", json!({ "text": text }), ACTION_TIMEOUT)
            .await
    }

    /// Press a named key (Return, Escape, Tab, ...).
    pub async fn key(&self, key: &str) -> RemoteResponse {
        self.post("key", json!({ "key": key }), ACTION_TIMEOUT).await
    }

    /// Scroll at screen coordinates.
    pub async fn scroll(&self, x: i64, y: i64, direction: &str, amount: i64) -> RemoteResponse {
        self.post(
            "scroll",
            json!({ "x": x, "y": y, "direction": direction, "amount": amount }),
            ACTION_TIMEOUT,
        )
        .await
    }

    /// Capture the screen. The endpoint may answer with JSON, raw image
    /// bytes, or plain text; classification happens in the resolver.
    pub async fn screenshot_raw(&self) -> Result<RawCapture> {
        let url = self.action_url("screenshot");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(SCREENSHOT_TIMEOUT)
            .send()
            .await
            .context("Screenshot request failed")?
            .error_for_status()
            .context("Screenshot endpoint returned error")?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response
            .bytes()
            .await
            .context("Failed to read screenshot body")?
            .to_vec();

        Ok(RawCapture { content_type, body })
    }
}
