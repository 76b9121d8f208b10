//! Configuration management for lmstudio-terminal
//!
//! Implements a layered configuration system, resolved per field:
//! 1. Explicit overrides (constructor arguments, CLI flags) - highest priority
//! 2. Environment variables (`LMSTUDIO_*`)
//! 3. Config file (`./config/default.json`, `lmstudio` section)
//! 4. Built-in defaults
//!
//! Every layer is a [`ConfigOverrides`]; [`LmStudioConfig::resolve`] folds
//! them into the immutable configuration the service runs with.

pub mod settings;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use self::settings::{
    ENV_BASE_URL, ENV_LEGACY_REMOTE_URL, ENV_LEGACY_USE_REMOTE, ENV_MAX_TOKENS, ENV_MODEL,
    ENV_REMOTE_URL, ENV_TEMPERATURE, ENV_USE_REMOTE,
};

/// Default local endpoint (LM Studio SDK address)
pub const DEFAULT_BASE_URL: &str = "ws://localhost:1234";

/// Default model substring
pub const DEFAULT_MODEL: &str = "qwen3-8b";

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion length
pub const DEFAULT_MAX_TOKENS: u32 = 200;

/// A partial configuration; `None` means "not set at this layer"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    /// Local endpoint address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Remote endpoint address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Try the remote endpoint first (tri-state: unset, true, false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_remote: Option<bool>,

    /// Substring used to pick a model from the server's list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LmStudioConfig {
    pub base_url: String,
    pub remote_url: Option<String>,
    pub use_remote: bool,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LmStudioConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            remote_url: None,
            use_remote: false,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl LmStudioConfig {
    /// Resolve a configuration from layers ordered highest priority first.
    ///
    /// For each field the first layer holding a usable value wins. Empty
    /// strings and non-finite temperatures count as unset.
    #[must_use]
    pub fn resolve(layers: &[&ConfigOverrides]) -> Self {
        let defaults = Self::default();

        let text = |pick: fn(&ConfigOverrides) -> Option<&String>| {
            layers
                .iter()
                .find_map(|layer| pick(*layer).filter(|s| !s.is_empty()).cloned())
        };

        Self {
            base_url: text(|l| l.base_url.as_ref()).unwrap_or(defaults.base_url),
            remote_url: text(|l| l.remote_url.as_ref()),
            use_remote: layers
                .iter()
                .find_map(|layer| layer.use_remote)
                .unwrap_or(defaults.use_remote),
            model: text(|l| l.model.as_ref()).unwrap_or(defaults.model),
            temperature: layers
                .iter()
                .find_map(|layer| layer.temperature.filter(|t| t.is_finite()))
                .unwrap_or(defaults.temperature),
            max_tokens: layers
                .iter()
                .find_map(|layer| layer.max_tokens)
                .unwrap_or(defaults.max_tokens),
        }
    }

    /// Endpoint the first connection attempt goes to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match (&self.remote_url, self.use_remote) {
            (Some(remote), true) => remote,
            _ => &self.base_url,
        }
    }

    /// Default config file location, relative to the working directory
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from("config").join("default.json")
    }
}
