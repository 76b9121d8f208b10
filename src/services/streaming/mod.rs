//! Streaming support for chat completions
//!
//! Turns the Server-Sent Events body of an OpenAI-compatible
//! `/v1/chat/completions` stream into ordered text deltas.

pub mod openai_stream;
pub mod sse_parser;

pub use openai_stream::{ChatStreamDecoder, StreamStep};
pub use sse_parser::{SseEvent, SseParser};

use serde::Deserialize;

/// One `chat.completion.chunk` payload
#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Servers report mid-stream failures as an `error` object
    #[serde(default)]
    pub error: Option<StreamErrorBody>,
}

/// Choice in a stream chunk
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental content of a choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Error object embedded in a stream
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StreamErrorBody {
    Detailed { message: String },
    Plain(String),
}

impl StreamErrorBody {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Detailed { message } | Self::Plain(message) => message,
        }
    }
}
