//! Incremental Server-Sent-Events framing.
//!
//! Bytes are buffered until a blank line closes a frame and only whole frames
//! are decoded to text, so a multi-byte character split across two network
//! chunks is never decoded in halves.

use serde_json::Value;

/// Status value that marks the end of a stream.
pub const TERMINAL_STATUS: &str = "all_done";

/// One SSE event: the optional `event:` name and its joined body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// Parses the frame body into a payload.
    pub fn payload(&self) -> SsePayload {
        SsePayload::parse(&self.data)
    }
}

/// Stateful decoder that turns arbitrary byte chunks into complete frames.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    // Bytes of `buf` already searched for a delimiter.
    scanned: usize,
}

impl SseDecoder {
    /// Appends a chunk and returns every frame it completed.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut from = self.scanned;
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf, from) {
            let frame_bytes: Vec<u8> = self.buf.drain(..idx + delim_len).take(idx).collect();
            if let Some(frame) = parse_sse_frame(&frame_bytes) {
                frames.push(frame);
            }
            from = 0;
        }
        self.scanned = self.buf.len();
        frames
    }

    /// Flushes a trailing frame that was not closed by a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        parse_sse_frame(&rest)
    }

    /// Returns true when no partial frame is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Finds the first blank line at or after `from`.
///
/// The search backs up three bytes so a delimiter split across two chunks is
/// still found.
fn find_frame_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from.saturating_sub(3);
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len()
            && buf[i] == b'\r'
            && buf[i + 1] == b'\n'
            && buf[i + 2] == b'\r'
            && buf[i + 3] == b'\n'
        {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn parse_sse_frame(bytes: &[u8]) -> Option<SseFrame> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut event: Option<String> = None;
    let mut body_lines: Vec<&str> = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            body_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
            continue;
        }
        if line.starts_with("id:") || line.starts_with("retry:") {
            continue;
        }
        // Servers that omit the `data:` prefix still get their line through.
        body_lines.push(line);
    }
    let data = body_lines.join("\n");
    if data.trim().is_empty() {
        return None;
    }
    Some(SseFrame { event, data })
}

/// A decoded frame body.
#[derive(Debug, Clone, PartialEq)]
pub enum SsePayload {
    /// The body parsed as JSON.
    Json(Value),
    /// The body was not JSON and is kept verbatim.
    Text(String),
}

impl SsePayload {
    /// Parses a frame body, falling back to the raw text. Never fails.
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(body.to_string()),
        }
    }

    /// Text shown to a user for this payload: pretty-printed JSON or the raw text.
    pub fn display_text(&self) -> String {
        match self {
            Self::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Self::Text(text) => text.clone(),
        }
    }

    /// Returns the JSON value when the body parsed.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Returns the top-level `status` string of a JSON object payload.
    pub fn status(&self) -> Option<&str> {
        self.as_json()?.get("status")?.as_str()
    }

    /// True for the payload that ends the stream (`status == "all_done"`).
    pub fn is_terminal(&self) -> bool {
        self.status() == Some(TERMINAL_STATUS)
    }
}
