use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, info};

use super::{
    health::HealthCommand, render::Renderer, run::AskCommand, sessions::SessionsCommand, shell,
};
use crate::app::App;
use crate::config::Config;

/// taxbot - ask the tax-law assistant from your terminal
#[derive(Parser)]
#[command(
    name = "taxbot",
    version,
    about = "Ask the tax-law assistant from your terminal",
    long_about = r#"taxbot talks to the tax-law question-answering backend, shows the statute
sections and articles it matched, and keeps your conversations so you can
pick them up later.

Examples:
  taxbot                                  # Start interactive mode
  taxbot ask "What is Section 80C?"       # Ask a single question
  taxbot ask -s 2 "What is the limit?"    # Continue saved conversation #2
  taxbot sessions list                    # List saved conversations"#
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    /// Backend base URL (overrides TAXBOT_API_URL and config files)
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,

    /// Directory holding saved conversations
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Keep conversations in memory only
    #[arg(long = "ephemeral", global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question non-interactively
    Ask(AskCommand),
    /// Manage saved conversations
    Sessions(SessionsCommand),
    /// Check that the backend is up
    Health,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        if self.debug {
            debug!("Debug logging enabled");
        }

        let config = self.load_config().await?;
        config.validate()?;
        debug!("Configuration initialized");

        let renderer = Renderer::new(config.wrap_width, std::io::stdout().is_terminal());
        let mut app = App::new(config, self.ephemeral).await?;

        let result = match &self.command {
            Some(Commands::Ask(ask)) => ask.execute(&mut app, &renderer).await,
            Some(Commands::Sessions(sessions)) => sessions.execute(&mut app, &renderer).await,
            Some(Commands::Health) => HealthCommand.execute(&app).await,
            None => {
                info!("Starting interactive mode");
                shell::run(&mut app, &renderer).await
            }
        };

        app.shutdown().await?;
        result
    }

    /// Configuration from files and environment, then command-line flags
    async fn load_config(&self) -> Result<Config> {
        let mut config = Config::init().await?;

        if let Some(api_url) = &self.api_url {
            config.api_base_url = api_url.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }

        Ok(config)
    }
}
