//! OpenAI-compatible HTTP client for LM Studio
//!
//! LM Studio serves an OpenAI-compatible REST API next to its SDK socket on
//! the same port. Endpoints are configured the way the SDK expects them
//! (`ws://host:1234`) and mapped onto HTTP here.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{LmStudioError, Result},
    messages::Message,
};

use super::{
    streaming::ChatStreamDecoder, ChatOptions, ChatResponse, ClientFactory, ModelClient, ModelInfo,
    TokenStream,
};

/// Map an SDK-style endpoint onto the REST API root (`.../v1`)
#[must_use]
pub fn rest_api_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');

    let http = if let Some(rest) = trimmed.strip_prefix("ws://") {
        format!("http://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    if http.ends_with("/v1") {
        http
    } else {
        format!("{http}/v1")
    }
}

/// HTTP client bound to one LM Studio endpoint
pub struct OpenAiCompatClient {
    client: Client,
    base_url: String,
    api_url: String,
    closed: AtomicBool,
}

impl OpenAiCompatClient {
    /// Create a client for `base_url`; performs no I/O
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .user_agent(concat!("lmstudio-terminal/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "falling back to default HTTP client settings");
                Client::new()
            });

        Self {
            client,
            base_url: base_url.to_string(),
            api_url: rest_api_url(base_url),
            closed: AtomicBool::new(false),
        }
    }

    /// REST root requests are sent to
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(LmStudioError::ClientClosed)
        } else {
            Ok(())
        }
    }

    /// Turn non-success statuses into [`LmStudioError::Api`]
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(LmStudioError::Api {
            status: status.as_u16(),
            message: error_text,
        })
    }

    async fn post_chat(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
        stream: bool,
    ) -> Result<Response> {
        self.ensure_open()?;

        let request = ChatRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream,
        };

        debug!(
            endpoint = %self.api_url,
            model,
            stream,
            messages = messages.len(),
            "sending chat request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .json(&request)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Process SSE byte stream into text deltas
    fn process_stream(
        byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    ) -> impl Stream<Item = Result<String>> + Send + 'static {
        async_stream::stream! {
            let mut decoder = ChatStreamDecoder::new();
            let mut byte_stream = Box::pin(byte_stream);
            let mut ended = false;

            while let Some(chunk_result) = byte_stream.next().await {
                let step = match chunk_result {
                    Ok(bytes) => decoder.push_bytes(&bytes),
                    Err(e) => Err(LmStudioError::Stream(e.to_string())),
                };

                match step {
                    Ok(step) => {
                        for token in step.tokens {
                            yield Ok(token);
                        }
                        if step.done {
                            ended = true;
                            break;
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        ended = true;
                        break;
                    }
                }
            }

            // Body closed without [DONE]
            if !ended {
                match decoder.finish() {
                    Ok(step) => {
                        for token in step.tokens {
                            yield Ok(token);
                        }
                    }
                    Err(e) => yield Err(e),
                }
            }
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.ensure_open()?;
        debug!(endpoint = %self.api_url, "listing models");

        let response = self
            .client
            .get(format!("{}/models", self.api_url))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let list: ModelList = response.json().await?;
        Ok(list.data)
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatResponse> {
        let response = self.post_chat(model, messages, options, false).await?;
        let api_response: ChatCompletion = response.json().await?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LmStudioError::Api {
                status: 200,
                message: "No choices in response".to_string(),
            })?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            model: api_response.model,
            finish_reason: choice.finish_reason,
        })
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<TokenStream> {
        let response = self.post_chat(model, messages, options, true).await?;
        let stream = Self::process_stream(response.bytes_stream());
        Ok(Box::pin(stream))
    }

    fn disconnect(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(endpoint = %self.base_url, "client disconnected");
        }
    }
}

/// Creates [`OpenAiCompatClient`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClientFactory;

impl ClientFactory for HttpClientFactory {
    fn create(&self, base_url: &str) -> Arc<dyn ModelClient> {
        Arc::new(OpenAiCompatClient::new(base_url))
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
