//! Environment and config-file layers

use std::{fs, path::Path};

use serde::Deserialize;
use tracing::debug;

use super::ConfigOverrides;
use crate::error::{LmStudioError, Result};

pub const ENV_BASE_URL: &str = "LMSTUDIO_BASE_URL";
pub const ENV_REMOTE_URL: &str = "LMSTUDIO_REMOTE_URL";
pub const ENV_LEGACY_REMOTE_URL: &str = "LMSTUDIO_DRAGON_URL";
pub const ENV_USE_REMOTE: &str = "LMSTUDIO_USE_REMOTE";
pub const ENV_LEGACY_USE_REMOTE: &str = "LMSTUDIO_USE_DRAGON";
pub const ENV_MODEL: &str = "LMSTUDIO_MODEL";
pub const ENV_TEMPERATURE: &str = "LMSTUDIO_TEMPERATURE";
pub const ENV_MAX_TOKENS: &str = "LMSTUDIO_MAX_TOKENS";

/// On-disk shape of the config file; only the `lmstudio` section is read
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    lmstudio: ConfigOverrides,
}

impl ConfigOverrides {
    /// Read the environment layer from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the environment layer through an arbitrary lookup.
    ///
    /// Numeric values that fail to parse are left unset so lower layers
    /// still apply.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let use_remote = match (get(ENV_USE_REMOTE), get(ENV_LEGACY_USE_REMOTE)) {
            (None, None) => None,
            (current, legacy) => {
                Some(current.as_deref() == Some("true") || legacy.as_deref() == Some("true"))
            }
        };

        Self {
            base_url: get(ENV_BASE_URL),
            remote_url: get(ENV_REMOTE_URL).or_else(|| get(ENV_LEGACY_REMOTE_URL)),
            use_remote,
            model: get(ENV_MODEL),
            temperature: get(ENV_TEMPERATURE)
                .and_then(|value| value.trim().parse::<f32>().ok())
                .filter(|t| t.is_finite()),
            max_tokens: get(ENV_MAX_TOKENS).and_then(|value| value.trim().parse::<u32>().ok()),
        }
    }

    /// Load the `lmstudio` section of a config file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&contents).map_err(|e| {
            LmStudioError::Json(format!("{}: {e}", path.display()))
        })?;
        Ok(file.lmstudio)
    }

    /// Load the file layer, treating a missing or malformed file as empty
    #[must_use]
    pub fn load_file_or_default(path: &Path) -> Self {
        match Self::load_file(path) {
            Ok(layer) => {
                debug!(path = %path.display(), "loaded config file");
                layer
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "config file not used");
                Self::default()
            }
        }
    }
}
