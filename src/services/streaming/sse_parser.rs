//! Server-Sent Events (SSE) parser
//!
//! Line-oriented framing per the W3C spec, enough for OpenAI-style chat
//! streams: `event:` and `data:` fields, comments, multi-line data.

/// SSE event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type, when the server names one
    pub event_type: Option<String>,

    /// Event data (JSON payload or the `[DONE]` marker)
    pub data: String,
}

impl SseEvent {
    /// Check if this is the done marker for OpenAI-compatible streams
    #[must_use]
    pub fn is_done_marker(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// SSE parser for streaming responses
///
/// Lines split across network reads are buffered until their newline arrives.
#[derive(Debug, Default)]
pub struct SseParser {
    current: SseEvent,
    has_data: bool,
    line_buffer: String,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed decoded text; returns every event completed by it
    pub fn parse_chunk(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.line_buffer.push_str(chunk);

        let mut events = Vec::new();
        while let Some(line_end) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=line_end).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Dispatch whatever is left once the body has ended
    pub fn flush(&mut self) -> Option<SseEvent> {
        if !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            // A completed event cannot come out of a non-empty line
            let _ = self.process_line(line.trim_end_matches('\r'));
        }
        self.take_event()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.take_event();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.current.event_type = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
                self.has_data = true;
            }
            // id / retry only matter for reconnecting clients
            _ => {}
        }

        None
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if !self.has_data {
            self.current = SseEvent::default();
            return None;
        }
        self.has_data = false;
        Some(std::mem::take(&mut self.current))
    }
}
