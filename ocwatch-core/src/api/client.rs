//! HTTP client for the agent server API
//!
//! Covers the request/response endpoints the watcher needs: health probe,
//! session listing, and per-session message history. The long-lived event
//! stream lives in [`super::sse`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Session metadata from GET /session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Server-assigned session id
    pub id: String,
    /// Human-readable title, when the session has one
    #[serde(default)]
    pub title: Option<String>,
    /// Workspace directory the session runs in
    #[serde(default)]
    pub directory: Option<String>,
    /// Creation and last-update timestamps
    #[serde(default)]
    pub time: Option<SessionTime>,
}

/// Session timestamps in epoch milliseconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionTime {
    #[serde(default)]
    pub created: Option<u64>,
    #[serde(default)]
    pub updated: Option<u64>,
}

/// HTTP client for the agent server
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    directory: Option<String>,
    max_retries: usize,
}

impl ApiClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.url.trim_end_matches('/').to_string();

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            directory: config.directory.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Build a full URL, scoping the request to the configured workspace
    /// directory when one is set.
    fn url(&self, path: &str) -> String {
        match &self.directory {
            Some(dir) => {
                let sep = if path.contains('?') { '&' } else { '?' };
                format!(
                    "{}{}{}directory={}",
                    self.base_url,
                    path,
                    sep,
                    urlencoding::encode(dir)
                )
            }
            None => format!("{}{}", self.base_url, path),
        }
    }

    /// Check whether the server is up and reports itself healthy. A server
    /// that cannot be reached at all reads as unhealthy, not as an error.
    pub async fn health(&self) -> Result<bool> {
        let url = self.url("/global/health");

        match self.http_client.get(&url).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    return Ok(false);
                }
                let body: Value = response
                    .json()
                    .await
                    .map_err(|e| Error::Source(format!("failed to parse response: {}", e)))?;
                Ok(health_from_body(&body))
            }
            Err(_) => Ok(false),
        }
    }

    /// List all sessions known to the server.
    pub async fn sessions(&self) -> Result<Vec<SessionInfo>> {
        let url = self.url("/session");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Source(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Source(format!("failed to parse response: {}", e)))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Source(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }

    /// Fetch the raw message history for a session, oldest first.
    ///
    /// The records come back in the server's `{info, parts}` shape; run
    /// them through [`expand_history_message`] before feeding the pipeline.
    pub async fn session_history(&self, session_id: &str) -> Result<Vec<Value>> {
        let url = self.url(&format!(
            "/session/{}/message",
            urlencoding::encode(session_id)
        ));

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Source(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Source(format!("failed to parse response: {}", e)))
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Err(Error::SessionNotFound(session_id.to_string()))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Source(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }

    /// Fetch session history with retry logic
    ///
    /// Retries transient failures (5xx, timeouts) with exponential backoff.
    /// A missing session is not transient and fails immediately.
    pub async fn session_history_with_retry(&self, session_id: &str) -> Result<Vec<Value>> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying session_history (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }

            match self.session_history(session_id).await {
                Ok(records) => return Ok(records),
                Err(e) => {
                    if is_retryable_error(&e) {
                        tracing::warn!("Transient error fetching history: {}", e);
                        last_error = Some(e);
                        continue;
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Source("max retries exceeded".to_string())))
    }
}

/// Flatten one history record (`{info, parts}`) into the per-event records
/// the pipeline consumes: one part event per part, then a finalize event
/// carrying the info object and the joined text.
///
/// Parts missing their session or message ids inherit them from `info`, so
/// a well-formed history record always expands to acceptable events.
/// Non-object input expands to nothing.
pub fn expand_history_message(message: &Value) -> Vec<Value> {
    let mut records = Vec::new();

    let info = message.get("info").filter(|i| i.is_object());
    let session_id = info.and_then(|i| i.get("sessionID")).and_then(Value::as_str);
    let message_id = info.and_then(|i| i.get("id")).and_then(Value::as_str);

    let mut text_parts: Vec<&str> = Vec::new();
    if let Some(parts) = message.get("parts").and_then(Value::as_array) {
        for part in parts.iter().filter(|p| p.is_object()) {
            if part.get("type").and_then(Value::as_str) == Some("text") {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    text_parts.push(text);
                }
            }

            let mut part = part.clone();
            if let Some(fields) = part.as_object_mut() {
                if !fields.contains_key("sessionID") {
                    if let Some(sid) = session_id {
                        fields.insert("sessionID".to_string(), json!(sid));
                    }
                }
                if !fields.contains_key("messageID") {
                    if let Some(mid) = message_id {
                        fields.insert("messageID".to_string(), json!(mid));
                    }
                }
            }
            records.push(json!({
                "payload": {"type": "message.part.updated", "properties": {"part": part}}
            }));
        }
    }

    if let Some(info) = info {
        let mut properties = json!({"info": info});
        if !text_parts.is_empty() {
            properties["finalizedMessage"] = Value::String(text_parts.join("\n"));
        }
        records.push(json!({
            "payload": {"type": "message.updated", "properties": properties}
        }));
    }

    records
}

/// Read the health flag out of a `/global/health` response body. Anything
/// other than `"healthy": true` reads as unhealthy.
fn health_from_body(body: &Value) -> bool {
    body.get("healthy").and_then(Value::as_bool).unwrap_or(false)
}

/// Whether a failure is worth retrying: transport problems and server-side
/// 5xx responses. Client errors and a missing session are permanent.
fn is_retryable_error(error: &Error) -> bool {
    let Error::Source(msg) = error else {
        return false;
    };

    const TRANSIENT: &[&str] = &["timeout", "connection", "request failed"];
    TRANSIENT.iter().any(|needle| msg.contains(needle)) || msg.contains("API error (5")
}
