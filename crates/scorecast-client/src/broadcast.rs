//! One-way event stream used by the spectator role.

use std::collections::VecDeque;

use scorecast_core::net::codec::DecodeError;
use scorecast_core::net::events::ViewerEvent;

use crate::error::TransportError;

/// Longest line accepted before the stream is treated as corrupt.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Incremental `text/event-stream` parser.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; complete `data`
/// payloads are returned once their terminating blank line arrives. Comment
/// lines and fields other than `data` are dropped.
#[derive(Debug, Default)]
pub struct SseParser {
    line: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, DecodeError> {
        let mut payloads = Vec::new();
        for &byte in chunk {
            if byte != b'\n' {
                if self.line.len() >= MAX_LINE_BYTES {
                    return Err(DecodeError::MalformedEvent(format!(
                        "line exceeds {MAX_LINE_BYTES} bytes"
                    )));
                }
                self.line.push(byte);
                continue;
            }
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
            let line = String::from_utf8(std::mem::take(&mut self.line))
                .map_err(|_| DecodeError::InvalidUtf8)?;
            if let Some(payload) = self.feed_line(&line) {
                payloads.push(payload);
            }
        }
        Ok(payloads)
    }

    fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let payload = self.data.join("\n");
            self.data.clear();
            return Some(payload);
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        if field == "data" {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        None
    }
}

/// Spectator connection to `/sse/view/{session_id}`.
pub struct BroadcastConnection {
    response: reqwest::Response,
    parser: SseParser,
    pending: VecDeque<String>,
}

impl BroadcastConnection {
    pub async fn connect(client: &reqwest::Client, url: &str) -> Result<Self, TransportError> {
        let response = client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }
        tracing::info!(url, "Broadcast channel connected");
        Ok(Self {
            response,
            parser: SseParser::new(),
            pending: VecDeque::new(),
        })
    }

    /// Next event, or `None` once the stream ends.
    pub async fn recv(&mut self) -> Result<Option<ViewerEvent>, TransportError> {
        loop {
            if let Some(payload) = self.pending.pop_front() {
                tracing::debug!(len = payload.len(), "Received event");
                return Ok(Some(ViewerEvent::from_json(&payload)?));
            }
            match self.response.chunk().await? {
                Some(bytes) => self.pending.extend(self.parser.push(&bytes)?),
                None => {
                    tracing::info!("Broadcast stream ended");
                    return Ok(None);
                },
            }
        }
    }
}
