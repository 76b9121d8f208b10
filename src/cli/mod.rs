//! CLI argument parsing and command routing

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::{ConfigOverrides, LmStudioConfig};

/// Terminal client for a local LM Studio server
#[derive(Debug, Parser)]
#[command(name = "lmstudio-terminal")]
#[command(about = "Ask a local LM Studio model from the terminal", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Local endpoint (overrides LMSTUDIO_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Remote endpoint (overrides LMSTUDIO_REMOTE_URL)
    #[arg(long, global = true)]
    pub remote_url: Option<String>,

    /// Try the remote endpoint first: true or false (overrides LMSTUDIO_USE_REMOTE)
    #[arg(long, global = true, action = ArgAction::Set, value_name = "BOOL")]
    pub use_remote: Option<bool>,

    /// Model id substring (overrides LMSTUDIO_MODEL)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Sampling temperature (overrides LMSTUDIO_TEMPERATURE)
    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate (overrides LMSTUDIO_MAX_TOKENS)
    #[arg(long, global = true)]
    pub max_tokens: Option<u32>,

    /// Config file to read instead of ./config/default.json
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ask the model a single question
    Ask {
        /// The prompt to send
        prompt: String,

        /// Extra context placed in the system message
        #[arg(long)]
        context: Option<String>,

        /// Print tokens as they arrive
        #[arg(long)]
        stream: bool,
    },

    /// Interactive chat; `clear` resets the saved context, `exit` quits
    Chat {
        /// Context file to use instead of the default under the data directory
        #[arg(long, value_name = "PATH")]
        history: Option<PathBuf>,
    },

    /// List the models the server offers
    Models,

    /// Print the resolved configuration
    Config,

    /// Show version information
    Version,
}

impl Cli {
    /// Parse CLI arguments from environment
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Explicit configuration layer given on the command line
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            remote_url: self.remote_url.clone(),
            use_remote: self.use_remote,
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Config file to load
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(LmStudioConfig::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_from_flags() {
        let cli = Cli::try_parse_from([
            "lmstudio-terminal",
            "--base-url",
            "ws://127.0.0.1:5555",
            "--use-remote",
            "false",
            "--temperature",
            "0.3",
            "ask",
            "hello",
            "--max-tokens",
            "50",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.base_url.as_deref(), Some("ws://127.0.0.1:5555"));
        assert_eq!(overrides.use_remote, Some(false));
        assert_eq!(overrides.temperature, Some(0.3));
        assert_eq!(overrides.max_tokens, Some(50));
        assert_eq!(overrides.model, None);
        assert!(matches!(
            cli.command,
            Some(Commands::Ask { ref prompt, stream: false, .. }) if prompt == "hello"
        ));
    }

    #[test]
    fn test_unset_flags_leave_layer_empty() {
        let cli = Cli::try_parse_from(["lmstudio-terminal", "config"]).unwrap();
        assert_eq!(cli.overrides(), ConfigOverrides::default());
        assert_eq!(cli.config_path(), PathBuf::from("config/default.json"));
    }

    #[test]
    fn test_chat_history_flag() {
        let cli = Cli::try_parse_from(["lmstudio-terminal", "chat", "--history", "ctx.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Chat { history: Some(ref path) }) if path == &PathBuf::from("ctx.json")
        ));

        let cli = Cli::try_parse_from(["lmstudio-terminal", "chat"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Chat { history: None })));
    }

    #[test]
    fn test_rejects_bad_bool() {
        assert!(Cli::try_parse_from(["lmstudio-terminal", "--use-remote", "maybe", "config"]).is_err());
    }
}
