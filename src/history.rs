//! Conversation context kept across `chat` sessions
//!
//! Stored as a JSON array of `"User: …"` / `"Assistant: …"` lines. The joined
//! lines are handed to the service as the `context` of the next turn.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::{LmStudioError, Result};

/// Entries kept on disk; the oldest are dropped when saving
pub const MAX_ENTRIES: usize = 2000;

/// Accumulated exchanges of an interactive chat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatHistory {
    entries: Vec<String>,
}

impl ChatHistory {
    /// Default history file under the user's data directory
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lmstudio-terminal")
            .join("context.json")
    }

    /// Load a saved history, treating a missing or malformed file as empty
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(entries) => Self { entries },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "starting with empty chat context");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Vec<String>> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| LmStudioError::Json(format!("{}: {e}", path.display())))
    }

    /// Write the history, keeping at most [`MAX_ENTRIES`] of the newest entries
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be written
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if self.entries.len() > MAX_ENTRIES {
            let excess = self.entries.len() - MAX_ENTRIES;
            self.entries.drain(..excess);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }

    /// Append one completed exchange
    pub fn record(&mut self, prompt: &str, reply: &str) {
        self.entries.push(format!("User: {prompt}"));
        self.entries.push(format!("Assistant: {reply}"));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Context for the next turn, `None` when nothing has been said yet
    #[must_use]
    pub fn context(&self) -> Option<String> {
        (!self.entries.is_empty()).then(|| self.entries.join("\n"))
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
