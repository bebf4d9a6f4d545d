// src/cli/app.rs
use anyhow::Result;
use tracing::{debug, info};

use crate::config::Config;

use super::commands::{self, Args, Commands};

/// The main application struct
pub struct App {
    args: Args,
}

impl App {
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    /// Load configuration and run the requested command
    pub async fn run(&self) -> Result<()> {
        info!("Starting dossier v{}", env!("CARGO_PKG_VERSION"));

        let config_path = self.args.config.as_deref();

        // Init must work even when the existing configuration is broken
        if let Some(command @ Commands::Init { .. }) = &self.args.command {
            return commands::execute_command(command, &Config::default(), config_path).await;
        }

        let config = Config::load(config_path)?;
        debug!("Effective configuration: {:?}", config);

        let command = self.args.command.clone().unwrap_or_else(Commands::interactive);
        commands::execute_command(&command, &config, config_path).await
    }
}
