use crate::executor::launch_spec::ExecutableData;
use crate::manager::agent_id::AgentID;
use crate::manager::defaults::{
    DEFAULT_COMPOSE_BIN, DEFAULT_DOCKER_BIN, DEFAULT_INVENTORY_INTERVAL, DEFAULT_TICK_CEILING,
};
use duration_str::deserialize_duration;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::metadata::LevelFilter;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error loading config: `{0}`")]
    Io(#[from] std::io::Error),

    #[error("error parsing config: `{0}`")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, PartialEq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct TickInterval(#[serde(deserialize_with = "deserialize_duration")] Duration);

impl Default for TickInterval {
    fn default() -> Self {
        Self(DEFAULT_TICK_CEILING)
    }
}

impl From<TickInterval> for Duration {
    fn from(value: TickInterval) -> Self {
        value.0
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct InventoryInterval(#[serde(deserialize_with = "deserialize_duration")] Duration);

impl Default for InventoryInterval {
    fn default() -> Self {
        Self(DEFAULT_INVENTORY_INTERVAL)
    }
}

impl From<InventoryInterval> for Duration {
    fn from(value: InventoryInterval) -> Self {
        value.0
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OrchestratorConfig {
    #[serde(default = "default_compose_bin")]
    pub compose_bin: String,
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            compose_bin: default_compose_bin(),
            docker_bin: default_docker_bin(),
        }
    }
}

fn default_compose_bin() -> String {
    DEFAULT_COMPOSE_BIN.to_string()
}

fn default_docker_bin() -> String {
    DEFAULT_DOCKER_BIN.to_string()
}

/// Launch command line of a natively supervised agent.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ExecConfig {
    pub bin: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl From<ExecConfig> for ExecutableData {
    fn from(value: ExecConfig) -> Self {
        ExecutableData::new(value.bin)
            .with_args(value.args)
            .with_env(value.env)
    }
}

/// One managed agent. `exec` supervises a native process, `service` a compose
/// service; an agent declaring neither is registered without a launch spec
/// and surfaces a configuration error when asked to come up.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct AgentConfig {
    pub class: String,
    /// Initial target state: `true` means up.
    #[serde(default = "default_run")]
    pub run: bool,
    #[serde(default)]
    pub exec: Option<ExecConfig>,
    #[serde(default)]
    pub service: Option<String>,
}

fn default_run() -> bool {
    true
}

/// Root configuration of the agent manager.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct AgentManagerConfig {
    #[serde(default)]
    pub log: LoggingConfig,

    /// Compose file whose services may back agent instances.
    #[serde(default)]
    pub compose_file: Option<PathBuf>,

    #[serde(default)]
    pub tick_interval: TickInterval,

    #[serde(default)]
    pub inventory_interval: InventoryInterval,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    pub agents: HashMap<AgentID, AgentConfig>,
}

impl AgentManagerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Self = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (agent_id, agent) in &self.agents {
            if agent.exec.is_some() && agent.service.is_some() {
                return Err(ConfigError::Invalid(format!(
                    "agent `{agent_id}` declares both exec and service"
                )));
            }
            if agent.service.is_some() && self.compose_file.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "agent `{agent_id}` declares a compose service but no compose_file is configured"
                )));
            }
        }
        Ok(())
    }
}
