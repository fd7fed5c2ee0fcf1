use crate::manager::config::ConfigError;
use thiserror::Error;

/// Top-level failures of the agent manager.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("unknown agent `{0}`")]
    UnknownAgent(String),

    #[error("agent `{0}` is not idle")]
    NotIdle(String),

    #[error("agent `{0}` has no launch spec")]
    MissingLaunchSpec(String),

    #[error("agent `{0}` declares a compose service but no compose stack is configured")]
    MissingComposeContext(String),
}
