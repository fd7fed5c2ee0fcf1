use crate::manager::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("init logging error: `{0}`")]
    TryInitError(String),
}

pub struct Logging;

impl Logging {
    /// Installs the global tracing subscriber. The configured level is the
    /// default directive; `RUST_LOG` still takes precedence over it.
    pub fn try_init(config: &LoggingConfig) -> Result<(), LoggingError> {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(config.level.level_filter().into())
                    .from_env_lossy(),
            )
            .try_init()
            .map_err(|_| {
                LoggingError::TryInitError(
                    "unable to set the global logging subscriber".to_string(),
                )
            })
    }
}
