//! This is the entry point for the agent manager.
//!
//! It implements the basic functionality of parsing the command line
//! arguments and either performing one-shot actions or starting the main
//! supervisor process.

use agent_manager::cli::{Cli, CliCommand};
use agent_manager::event::{pub_sub, ApplicationEvent, EventPublisher};
use agent_manager::manager::config::AgentManagerConfig;
use agent_manager::manager::run::AgentManagerRunner;
use std::error::Error;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli_command = match Cli::init() {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let config = match cli_command {
        CliCommand::Run(config) => config,
        CliCommand::CheckOnly => return ExitCode::SUCCESS,
    };

    match _main(config) {
        Err(err) => {
            error!("the agent manager main process exited with an error: {err}");
            ExitCode::FAILURE
        }
        Ok(()) => {
            info!("the agent manager main process exited successfully");
            ExitCode::SUCCESS
        }
    }
}

/// This is the actual main function.
///
/// It is separated from [main] so errors propagate in string form and get
/// logged exactly once.
fn _main(config: AgentManagerConfig) -> Result<(), Box<dyn Error>> {
    let (application_event_publisher, application_event_consumer) = pub_sub();

    create_shutdown_signal_handler(application_event_publisher)?;

    AgentManagerRunner::try_new(config)?.run(application_event_consumer);

    Ok(())
}

/// Enables the typical keypress (Ctrl-C) to stop the agent manager at any
/// moment by publishing [ApplicationEvent::StopRequested], so the runner can
/// drain every instance before exiting.
fn create_shutdown_signal_handler(
    publisher: EventPublisher<ApplicationEvent>,
) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        info!("received termination signal, stopping the agent manager");
        let _ = publisher
            .publish(ApplicationEvent::StopRequested)
            .inspect_err(|err| error!("could not send stop request: {err}"));
    })
}
