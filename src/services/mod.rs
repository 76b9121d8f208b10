//! Service layer for the LM Studio model server
//!
//! This module provides:
//! - [`ModelClient`]: the seam to the model-serving backend (listing, chat, streaming chat)
//! - [`openai::OpenAiCompatClient`]: the HTTP implementation against LM Studio's
//!   OpenAI-compatible REST API
//! - [`lmstudio::LmStudioService`]: the adapter that resolves configuration, picks a
//!   model, falls back from remote to local, and publishes lifecycle events

pub mod lmstudio;
pub mod openai;
pub mod streaming;

use std::{pin::Pin, sync::Arc};

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::{error::Result, messages::Message};

/// Sampling options sent with every chat request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Temperature for sampling
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

/// A model as listed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier, e.g. `qwen3-8b-mlx`
    pub id: String,

    /// Publisher reported by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

impl ModelInfo {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owned_by: None,
        }
    }
}

/// Response from a single-shot chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated text
    pub content: String,

    /// Model that served the request, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Why generation stopped, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Lazy, finite, non-restartable sequence of text chunks
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Core trait for model-serving clients
///
/// A client is bound to one endpoint for its whole lifetime. Creating one
/// performs no I/O; all network traffic happens in the async methods.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Endpoint this client is bound to, as configured
    fn base_url(&self) -> &str;

    /// List the models the server can serve
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Create a non-streaming chat completion
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatResponse>;

    /// Create a streaming chat completion
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<TokenStream>;

    /// Release the connection; later calls fail
    fn disconnect(&self);
}

/// Builds clients bound to a given endpoint
pub trait ClientFactory: Send + Sync {
    fn create(&self, base_url: &str) -> Arc<dyn ModelClient>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_info_deserialization() {
        let info: ModelInfo =
            serde_json::from_str(r#"{"id":"qwen3-8b","object":"model","owned_by":"organization_owner"}"#)
                .unwrap();
        assert_eq!(info.id, "qwen3-8b");
        assert_eq!(info.owned_by.as_deref(), Some("organization_owner"));

        let info: ModelInfo = serde_json::from_str(r#"{"id":"phi-3"}"#).unwrap();
        assert_eq!(info, ModelInfo::new("phi-3"));
    }
}
