//! Command line interface for the agent manager.
//!
//! Parses the command line arguments and decides how the application runs as
//! defined in [CliCommand].

use crate::logging::{Logging, LoggingError};
use crate::manager::config::AgentManagerConfig;
use crate::manager::defaults::DEFAULT_CONFIG_PATH;
use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// All possible errors that can happen while running the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// The config could not be read
    #[error("could not read agent manager config from `{0}`: `{1}`")]
    Loader(String, String),
    /// Could not initialize logging
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// What action was requested from the CLI?
pub enum CliCommand {
    /// Normal operation with the loaded configuration.
    Run(AgentManagerConfig),
    /// The configuration was validated; nothing left to do.
    CheckOnly,
}

/// Command line arguments for the agent manager, as parsed by [`clap`].
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
pub struct Cli {
    /// Path to the agent manager configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

impl Cli {
    /// Parses command line arguments and decides how the application runs.
    pub fn init() -> Result<CliCommand, CliError> {
        let cli = Self::parse();

        let config = AgentManagerConfig::load(&cli.config).map_err(|err| {
            CliError::Loader(cli.config.display().to_string(), err.to_string())
        })?;

        if cli.check {
            println!("configuration OK: {}", cli.config.display());
            return Ok(CliCommand::CheckOnly);
        }

        Logging::try_init(&config.log)?;
        info!(
            "starting agent manager with config file '{}'",
            cli.config.display()
        );

        Ok(CliCommand::Run(config))
    }
}
