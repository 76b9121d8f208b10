//! Message types for single-turn chat requests
//!
//! Each completion call builds a fresh sequence: an optional system message
//! carrying context, followed by the user's prompt. Nothing is carried over
//! between calls.

use serde::{Deserialize, Serialize};

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a new system message
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    /// Create a new user message
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
}

/// Build the message sequence for one request.
///
/// The system message is only added when `context` is present and non-empty;
/// `preamble` is prepended to it verbatim.
#[must_use]
pub fn single_turn(preamble: &str, prompt: &str, context: Option<&str>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);

    if let Some(context) = context.filter(|c| !c.is_empty()) {
        messages.push(Message::system(format!("{preamble} Context: {context}")));
    }

    messages.push(Message::user(prompt));
    messages
}
