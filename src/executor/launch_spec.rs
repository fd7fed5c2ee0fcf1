use std::collections::HashMap;

/// Command line of a native agent process. The child inherits the ambient
/// environment; `env` adds on top of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableData {
    pub bin: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl ExecutableData {
    pub fn new(bin: String) -> Self {
        ExecutableData {
            bin,
            args: Vec::default(),
            env: HashMap::default(),
        }
    }

    pub fn with_args(self, args: Vec<String>) -> Self {
        Self { args, ..self }
    }

    pub fn with_env(self, env: HashMap<String, String>) -> Self {
        Self { env, ..self }
    }
}

/// How an agent instance is brought up. Absence of a launch spec on a record
/// is a permanent configuration error surfaced at launch time.
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchSpec {
    /// Spawn a native subprocess.
    Process(ExecutableData),
    /// Drive a service of the configured compose file.
    ComposeService { service: String },
}
