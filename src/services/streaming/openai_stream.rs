//! OpenAI-compatible chat stream decoder
//!
//! Consumes raw body bytes and yields text deltas in arrival order. Bytes of
//! a multi-byte character split across reads are carried to the next call.

use crate::error::{LmStudioError, Result};

use super::{ChatStreamChunk, SseEvent, SseParser};

/// Output of one decoding step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStep {
    /// Text deltas, in stream order
    pub tokens: Vec<String>,

    /// `[DONE]` has been seen; nothing after it is decoded
    pub done: bool,
}

/// Decoder for streaming chat responses
#[derive(Debug, Default)]
pub struct ChatStreamDecoder {
    parser: SseParser,
    pending: Vec<u8>,
    done: bool,
}

impl ChatStreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of body bytes
    ///
    /// # Errors
    ///
    /// Returns an error on invalid UTF-8, an unparsable chunk, or an error
    /// object sent by the server
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<StreamStep> {
        self.pending.extend_from_slice(bytes);

        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(LmStudioError::Stream(format!(
                    "Invalid UTF-8 in stream: {e}"
                )))
            }
        };

        let text: Vec<u8> = self.pending.drain(..valid).collect();
        let text = String::from_utf8(text)
            .map_err(|e| LmStudioError::Stream(format!("Invalid UTF-8 in stream: {e}")))?;
        self.push_str(&text)
    }

    /// Feed already-decoded text
    ///
    /// # Errors
    ///
    /// Returns an error on an unparsable chunk or an error object sent by the server
    pub fn push_str(&mut self, text: &str) -> Result<StreamStep> {
        let mut step = StreamStep::default();
        for event in self.parser.parse_chunk(text) {
            self.decode_event(&event, &mut step)?;
        }
        step.done = self.done;
        Ok(step)
    }

    /// Signal end of body and decode any trailing event
    ///
    /// # Errors
    ///
    /// Returns an error if the body ended inside a UTF-8 sequence or the
    /// trailing event is malformed
    pub fn finish(&mut self) -> Result<StreamStep> {
        if !self.pending.is_empty() {
            return Err(LmStudioError::Stream(
                "Stream ended inside a UTF-8 sequence".to_string(),
            ));
        }

        let mut step = StreamStep::default();
        if let Some(event) = self.parser.flush() {
            self.decode_event(&event, &mut step)?;
        }
        self.done = true;
        step.done = true;
        Ok(step)
    }

    /// Whether the `[DONE]` marker (or end of body) has been reached
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_event(&mut self, event: &SseEvent, step: &mut StreamStep) -> Result<()> {
        if self.done {
            return Ok(());
        }

        if event.is_done_marker() {
            self.done = true;
            return Ok(());
        }

        let chunk: ChatStreamChunk = serde_json::from_str(&event.data)
            .map_err(|e| LmStudioError::Stream(format!("Failed to parse SSE event: {e}")))?;

        if let Some(error) = chunk.error {
            return Err(LmStudioError::Stream(error.message().to_string()));
        }

        // Role-only and finish chunks carry no text
        if let Some(content) = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
        {
            step.tokens.push(content);
        }

        Ok(())
    }
}
