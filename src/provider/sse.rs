//! Incremental parser for `text/event-stream` response bodies.

use anyhow::anyhow;

/// Collects `data:` fields and yields one payload per event.
///
/// Bytes may be split anywhere, including inside a line or a UTF-8
/// sequence; incomplete lines stay buffered until the next `push`.
#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
    data: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<anyhow::Result<String>> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line = self.buf.drain(..=pos).collect::<Vec<u8>>();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if line.is_empty() {
                if let Some(data) = self.data.take() {
                    out.push(Ok(data));
                }
                continue;
            }

            let line = match std::str::from_utf8(&line) {
                Ok(s) => s,
                Err(e) => {
                    out.push(Err(anyhow!(e).context("SSE line is not valid UTF-8")));
                    continue;
                }
            };

            // event:, id:, retry: and comments carry nothing we use.
            if let Some(rest) = line.strip_prefix("data:") {
                self.append_data(rest);
            }
        }

        out
    }

    /// Flush an event left open when the body ended without a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buf.is_empty() {
            let tail = std::mem::take(&mut self.buf);
            let mut tail = String::from_utf8_lossy(&tail).into_owned();
            if tail.ends_with('\r') {
                tail.pop();
            }
            if let Some(rest) = tail.strip_prefix("data:") {
                self.append_data(rest);
            }
        }
        self.data.take()
    }

    fn append_data(&mut self, rest: &str) {
        // A single leading space is part of the field separator.
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        match &mut self.data {
            Some(data) => {
                data.push('\n');
                data.push_str(rest);
            }
            None => self.data = Some(rest.to_string()),
        }
    }
}
