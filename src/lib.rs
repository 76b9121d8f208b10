//! lmstudio-terminal: LM Studio service adapter
//!
//! Resolves connection settings from overrides, environment and a config
//! file, connects to an LM Studio server (remote first, local fallback), and
//! runs blocking or streaming single-turn chat completions. Interactive chat
//! keeps its running context in a [`history::ChatHistory`] file.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::too_many_lines)]

pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod messages;
pub mod services;

// Re-exports for convenience
pub use config::{ConfigOverrides, LmStudioConfig};
pub use error::{LmStudioError, Result};
pub use services::lmstudio::{LmStudioService, ServiceEvent};
