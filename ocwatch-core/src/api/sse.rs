//! Server-sent event stream subscription
//!
//! The server pushes every event over one long-lived `text/event-stream`
//! response at `/global/event`. This module owns the transport concerns
//! only: connecting, splitting the byte stream into SSE frames, pulling
//! out each frame's `data:` payload, and reconnecting with backoff when
//! the stream drops. What the payload means is the pipeline's business;
//! callers get it as an opaque string.

use std::time::Duration;

use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Connection state reported to the status callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// First connection attempt in progress
    Connecting,
    /// Stream is open and delivering events
    Connected,
    /// Stream dropped; a new attempt is scheduled
    Reconnecting,
    /// Stream closed (reported just before the backoff wait)
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription to the server's event stream.
pub struct EventStream {
    url: String,
    reconnect_base: Duration,
    reconnect_max: Duration,
}

impl EventStream {
    /// Build a subscription from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let base = config.url.trim_end_matches('/');
        let url = match &config.directory {
            Some(dir) => format!(
                "{}/global/event?directory={}",
                base,
                urlencoding::encode(dir)
            ),
            None => format!("{}/global/event", base),
        };

        Ok(Self {
            url,
            reconnect_base: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
        })
    }

    /// Consume the stream until the caller drops the future.
    ///
    /// `on_data` receives each frame's raw data payload; `on_status` sees
    /// every connection state change. Network failures never surface as
    /// errors here: the stream reconnects forever with capped exponential
    /// backoff, resetting the delay after each successful connection.
    pub async fn run<D, S>(&self, mut on_data: D, mut on_status: S) -> Result<()>
    where
        D: FnMut(&str),
        S: FnMut(ConnectionStatus),
    {
        // Only the connect phase gets a timeout; an open stream may stay
        // silent for as long as the server has nothing to say.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        let mut delay = self.reconnect_base;
        let mut first_attempt = true;

        loop {
            on_status(if first_attempt {
                ConnectionStatus::Connecting
            } else {
                ConnectionStatus::Reconnecting
            });
            first_attempt = false;

            let response = match self.connect(&client).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(error = %err, "Event stream connection failed");
                    on_status(ConnectionStatus::Disconnected);
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.reconnect_max);
                    continue;
                }
            };

            info!(url = %self.url, "Event stream connected");
            on_status(ConnectionStatus::Connected);
            delay = self.reconnect_base;

            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);
                        for frame in drain_frames(&mut buffer) {
                            if let Some(data) = data_payload(&frame) {
                                on_data(&data);
                            }
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "Event stream read failed");
                        break;
                    }
                }
            }

            debug!(delay_ms = delay.as_millis() as u64, "Event stream closed, reconnecting");
            on_status(ConnectionStatus::Disconnected);
            tokio::time::sleep(delay).await;
            delay = std::cmp::min(delay * 2, self.reconnect_max);
        }
    }

    async fn connect(&self, client: &reqwest::Client) -> Result<reqwest::Response> {
        let response = client
            .get(&self.url)
            .header("accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::Source(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Source(format!("API error ({})", status)));
        }
        Ok(response)
    }
}

/// Blank-line frame delimiters, CRLF and bare LF style.
const FRAME_DELIMITERS: [&[u8]; 2] = [b"\r\n\r\n", b"\n\n"];

/// Locate the earliest frame delimiter in the buffer. Returns the frame
/// length and the delimiter length.
fn find_frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut found: Option<(usize, usize)> = None;
    for delim in FRAME_DELIMITERS {
        let hit = buffer
            .windows(delim.len())
            .position(|window| window == delim);
        if let Some(pos) = hit {
            if found.map_or(true, |(at, _)| pos < at) {
                found = Some((pos, delim.len()));
            }
        }
    }
    found
}

/// Split complete SSE frames (terminated by a blank line) off the front of
/// the buffer, leaving any partial frame in place for the next chunk. The
/// buffer holds raw bytes and a frame is decoded only once it is complete,
/// so a multibyte character split across network chunks survives intact.
fn drain_frames(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut frames = Vec::new();
    while let Some((len, delim_len)) = find_frame_end(buffer) {
        let frame = String::from_utf8_lossy(&buffer[..len]).into_owned();
        buffer.drain(..len + delim_len);
        frames.push(frame);
    }
    frames
}

/// Extract the `data:` payload from one SSE frame, if it carries one.
/// Multiple `data:` lines in a frame concatenate with newlines; comment
/// and `event:` lines are skipped.
fn data_payload(frame: &str) -> Option<String> {
    let mut lines = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest));

    let mut data = lines.next()?.to_string();
    for line in lines {
        data.push('\n');
        data.push_str(line);
    }
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_complete_frames() {
        let mut buffer = b"data: one\n\ndata: two\n\n".to_vec();
        let frames = drain_frames(&mut buffer);
        assert_eq!(frames, vec!["data: one", "data: two"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_frame_stays_buffered() {
        let mut buffer = b"data: one\n\ndata: tw".to_vec();
        let frames = drain_frames(&mut buffer);
        assert_eq!(frames, vec!["data: one"]);
        assert_eq!(buffer, b"data: tw".to_vec());

        // The rest of the frame arrives with the next chunk
        buffer.extend_from_slice(b"o\n\n");
        let frames = drain_frames(&mut buffer);
        assert_eq!(frames, vec!["data: two"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_crlf_framed_events() {
        let mut buffer = b"data: a\r\ndata: b\r\n\r\ndata: c\r\n\r\n".to_vec();
        let frames = drain_frames(&mut buffer);
        assert_eq!(frames.len(), 2);
        assert_eq!(data_payload(&frames[0]), Some("a\nb".to_string()));
        assert_eq!(data_payload(&frames[1]), Some("c".to_string()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let full = "data: {\"text\":\"héllo\"}\n\n".as_bytes().to_vec();
        // Split between the two bytes of the é
        let split = full.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut buffer = full[..split].to_vec();
        assert!(drain_frames(&mut buffer).is_empty());

        buffer.extend_from_slice(&full[split..]);
        let frames = drain_frames(&mut buffer);
        assert_eq!(
            data_payload(&frames[0]),
            Some("{\"text\":\"héllo\"}".to_string())
        );
    }

    #[test]
    fn test_data_payload_extraction() {
        assert_eq!(
            data_payload("event: message\ndata: {\"type\":\"x\"}"),
            Some("{\"type\":\"x\"}".to_string())
        );
        assert_eq!(data_payload(": keepalive comment"), None);
        assert_eq!(data_payload(""), None);
    }

    #[test]
    fn test_multi_line_data_concatenates() {
        assert_eq!(
            data_payload("data: {\"a\":\ndata: 1}"),
            Some("{\"a\":\n1}".to_string())
        );
        // The space after the colon is optional
        assert_eq!(data_payload("data:bare"), Some("bare".to_string()));
    }

    #[test]
    fn test_stream_url_includes_directory() {
        let stream = EventStream::new(&ServerConfig {
            url: "http://127.0.0.1:4096".to_string(),
            directory: Some("/work/demo".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            stream.url,
            "http://127.0.0.1:4096/global/event?directory=%2Fwork%2Fdemo"
        );

        let stream = EventStream::new(&ServerConfig::default()).unwrap();
        assert_eq!(stream.url, "http://127.0.0.1:4096/global/event");
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(ConnectionStatus::Connecting.as_str(), "connecting");
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
    }
}
