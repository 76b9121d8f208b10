//! LM Studio service adapter
//!
//! Resolves configuration, picks a model on connect (remote endpoint first
//! when configured, with a single fall back to the local endpoint), runs
//! single-turn completions and publishes lifecycle events.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    config::{ConfigOverrides, LmStudioConfig},
    error::{LmStudioError, Result},
    messages::single_turn,
};

use super::{openai::HttpClientFactory, ChatOptions, ClientFactory, ModelClient, ModelInfo};

/// Appended to the model id when connected through the local fallback
pub const FALLBACK_SUFFIX: &str = " (local fallback)";

const COMPLETION_PREAMBLE: &str =
    "You are an intelligent terminal assistant. Help with command line tasks.";
const STREAMING_PREAMBLE: &str = "You are an intelligent terminal assistant.";

const EVENT_CAPACITY: usize = 64;

/// Lifecycle notifications published by [`LmStudioService`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// A model was selected; carries its id (tagged when it came from the fallback)
    Connected(String),
    /// The client connection was released
    Disconnected,
    /// An operation failed
    Error(LmStudioError),
}

/// The selected model and the client that listed it
#[derive(Clone)]
pub struct ModelHandle {
    info: ModelInfo,
    client: Arc<dyn ModelClient>,
}

impl ModelHandle {
    #[must_use]
    pub fn info(&self) -> &ModelInfo {
        &self.info
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("info", &self.info)
            .field("endpoint", &self.client.base_url())
            .finish()
    }
}

/// Pick the first model whose id contains `wanted`, else the first listed
#[must_use]
pub fn pick_model(models: Vec<ModelInfo>, wanted: &str) -> Option<ModelInfo> {
    let index = models
        .iter()
        .position(|model| model.id.contains(wanted))
        .unwrap_or(0);
    models.into_iter().nth(index)
}

/// Adapter over an LM Studio model server
pub struct LmStudioService {
    config: LmStudioConfig,
    factory: Arc<dyn ClientFactory>,
    client: Arc<dyn ModelClient>,
    model: Option<ModelHandle>,
    released: bool,
    events: broadcast::Sender<ServiceEvent>,
}

impl LmStudioService {
    /// Create a service from explicit overrides, the process environment and
    /// `./config/default.json`.
    ///
    /// Never fails: an unreadable config file is ignored.
    #[must_use]
    pub fn new(overrides: ConfigOverrides) -> Self {
        let env = ConfigOverrides::from_env();
        let file = ConfigOverrides::load_file_or_default(&LmStudioConfig::default_path());
        Self::with_factory(&overrides, &env, &file, Arc::new(HttpClientFactory))
    }

    /// Create a service from explicit layers, highest priority first
    #[must_use]
    pub fn with_factory(
        explicit: &ConfigOverrides,
        env: &ConfigOverrides,
        file: &ConfigOverrides,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self::with_config(LmStudioConfig::resolve(&[explicit, env, file]), factory)
    }

    /// Create a service from a resolved configuration
    #[must_use]
    pub fn with_config(config: LmStudioConfig, factory: Arc<dyn ClientFactory>) -> Self {
        let endpoint = config.endpoint().to_string();
        debug!(%endpoint, model = %config.model, "creating LM Studio client");

        let client = factory.create(&endpoint);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            config,
            factory,
            client,
            model: None,
            released: false,
            events,
        }
    }

    /// Receive lifecycle events emitted from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &LmStudioConfig {
        &self.config
    }

    /// Endpoint of the client currently in use
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.client.base_url()
    }

    #[must_use]
    pub fn active_model(&self) -> Option<&ModelInfo> {
        self.model.as_ref().map(ModelHandle::info)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.model.is_some()
    }

    /// List models and select one.
    ///
    /// When the remote endpoint is in use and fails, retries once against the
    /// local endpoint. A successful fallback hides the remote failure. After
    /// [`disconnect`](Self::disconnect) a fresh client is bound to the
    /// configured endpoint first.
    ///
    /// # Errors
    ///
    /// Returns [`LmStudioError::NoModelsAvailable`] for an empty listing, or
    /// the client's failure. With a fallback, the fallback's failure.
    pub async fn connect(&mut self) -> Result<()> {
        self.model = None;
        if self.released {
            let endpoint = self.config.endpoint();
            debug!(%endpoint, "rebuilding released client");
            self.client = self.factory.create(endpoint);
            self.released = false;
        }

        let attempt = Self::select_model(&self.client, &self.config.model).await;
        let err = match attempt {
            Ok(handle) => {
                let id = handle.info.id.clone();
                self.attach(handle, id);
                return Ok(());
            }
            Err(err) => err,
        };

        if self.can_fall_back() {
            warn!(
                remote = %self.client.base_url(),
                local = %self.config.base_url,
                "Remote endpoint failed, falling back to local LM Studio"
            );
            self.client = self.factory.create(&self.config.base_url);

            let fallback = Self::select_model(&self.client, &self.config.model).await;
            return match fallback {
                Ok(handle) => {
                    let id = format!("{}{FALLBACK_SUFFIX}", handle.info.id);
                    self.attach(handle, id);
                    Ok(())
                }
                Err(fallback_err) => {
                    self.emit(ServiceEvent::Error(fallback_err.clone()));
                    Err(fallback_err)
                }
            };
        }

        self.emit(ServiceEvent::Error(err.clone()));
        Err(err)
    }

    /// Single-shot completion of `prompt`, optionally with context
    ///
    /// # Errors
    ///
    /// Returns [`LmStudioError::NotConnected`] before a successful connect,
    /// or the chat failure (also emitted as an event)
    pub async fn get_completion(&self, prompt: &str, context: Option<&str>) -> Result<String> {
        let handle = self.model.as_ref().ok_or(LmStudioError::NotConnected)?;
        let messages = single_turn(COMPLETION_PREAMBLE, prompt, context);

        match handle
            .client
            .chat(&handle.info.id, &messages, &self.chat_options())
            .await
        {
            Ok(response) => Ok(response.content),
            Err(e) => {
                self.emit(ServiceEvent::Error(e.clone()));
                Err(e)
            }
        }
    }

    /// Streaming completion; `on_token` runs for each chunk in arrival order
    /// before the next one is awaited
    ///
    /// # Errors
    ///
    /// Returns [`LmStudioError::NotConnected`] before a successful connect,
    /// or the first stream failure. Stream failures are not emitted.
    pub async fn get_streaming_completion<F>(
        &self,
        prompt: &str,
        mut on_token: F,
        context: Option<&str>,
    ) -> Result<()>
    where
        F: FnMut(&str),
    {
        let handle = self.model.as_ref().ok_or(LmStudioError::NotConnected)?;
        let messages = single_turn(STREAMING_PREAMBLE, prompt, context);

        let mut stream = handle
            .client
            .chat_stream(&handle.info.id, &messages, &self.chat_options())
            .await?;

        while let Some(chunk) = stream.next().await {
            on_token(&chunk?);
        }

        Ok(())
    }

    /// Models offered by the current endpoint; does not change the selection
    ///
    /// # Errors
    ///
    /// Returns the client's failure (also emitted as an event)
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.client.list_models().await.map_err(|e| {
            self.emit(ServiceEvent::Error(e.clone()));
            e
        })
    }

    /// Release the client connection and forget the selected model.
    ///
    /// A later [`connect`](Self::connect) starts over from the configured
    /// endpoint with a new client.
    pub fn disconnect(&mut self) {
        self.client.disconnect();
        self.released = true;
        self.model = None;
        self.emit(ServiceEvent::Disconnected);
    }

    fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    fn can_fall_back(&self) -> bool {
        self.config.use_remote
            && self.config.remote_url.is_some()
            && self.client.base_url() != self.config.base_url
    }

    async fn select_model(client: &Arc<dyn ModelClient>, wanted: &str) -> Result<ModelHandle> {
        let models = client.list_models().await?;
        debug!(endpoint = %client.base_url(), count = models.len(), "listed models");

        let info = pick_model(models, wanted).ok_or_else(|| LmStudioError::NoModelsAvailable {
            endpoint: client.base_url().to_string(),
        })?;

        Ok(ModelHandle {
            info,
            client: Arc::clone(client),
        })
    }

    fn attach(&mut self, handle: ModelHandle, label: String) {
        info!(model = %label, endpoint = %handle.client.base_url(), "connected");
        self.model = Some(handle);
        self.emit(ServiceEvent::Connected(label));
    }

    fn emit(&self, event: ServiceEvent) {
        // Sending only fails when nobody is subscribed
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for LmStudioService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmStudioService")
            .field("config", &self.config)
            .field("endpoint", &self.client.base_url())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
