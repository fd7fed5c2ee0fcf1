use crate::compose::error::InventoryError;
use crate::manager::defaults::{DEFAULT_COMPOSE_BIN, DEFAULT_DOCKER_BIN};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub const COMPOSE_WORKING_DIR_LABEL: &str = "com.docker.compose.project.working_dir";
pub const COMPOSE_CONFIG_FILES_LABEL: &str = "com.docker.compose.project.config_files";
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

/// What the runtime knows about one container, reduced to the fields the
/// inventory reader acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDetails {
    pub working_dir: PathBuf,
    pub config_files: String,
    pub service: String,
    pub running: bool,
    pub exit_code: Option<i32>,
}

/// Query side of the container runtime, kept behind a trait so the inventory
/// reader can be exercised without a docker daemon.
#[cfg_attr(test, mockall::automock)]
pub trait ComposeRuntime {
    /// Container ids scoped to the given compose file.
    fn container_ids(&self, compose_file: &Path) -> Result<Vec<String>, InventoryError>;

    /// Details of one container, by id.
    fn inspect_container(&self, container_id: &str) -> Result<ContainerDetails, InventoryError>;
}

/// Adapter shelling out to the `docker-compose` and `docker` CLIs.
#[derive(Debug, Clone)]
pub struct DockerComposeCli {
    compose_bin: String,
    docker_bin: String,
}

impl Default for DockerComposeCli {
    fn default() -> Self {
        Self::new(DEFAULT_COMPOSE_BIN.to_string(), DEFAULT_DOCKER_BIN.to_string())
    }
}

impl DockerComposeCli {
    pub fn new(compose_bin: String, docker_bin: String) -> Self {
        Self {
            compose_bin,
            docker_bin,
        }
    }

    /// `<compose_bin> -f <file> up -d <service>`
    pub fn compose_up(&self, compose_file: &Path, service: &str) -> std::io::Result<Output> {
        Command::new(&self.compose_bin)
            .arg("-f")
            .arg(compose_file)
            .args(["up", "-d", service])
            .output()
    }

    /// `<compose_bin> -f <file> rm --stop --force <service>`
    pub fn compose_rm(&self, compose_file: &Path, service: &str) -> std::io::Result<Output> {
        Command::new(&self.compose_bin)
            .arg("-f")
            .arg(compose_file)
            .args(["rm", "--stop", "--force", service])
            .output()
    }
}

impl ComposeRuntime for DockerComposeCli {
    fn container_ids(&self, compose_file: &Path) -> Result<Vec<String>, InventoryError> {
        let output = Command::new(&self.compose_bin)
            .arg("-f")
            .arg(compose_file)
            .args(["ps", "-q"])
            .output()
            .map_err(|err| InventoryError::Config(format!("could not run {}: {err}", self.compose_bin)))?;

        if !output.status.success() {
            return Err(InventoryError::Config(format!(
                "{} ps exited with code {:?}, error text: {}",
                self.compose_bin,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn inspect_container(&self, container_id: &str) -> Result<ContainerDetails, InventoryError> {
        let output = Command::new(&self.docker_bin)
            .args(["inspect", container_id])
            .output()
            .map_err(|err| InventoryError::Runtime(format!("could not run {}: {err}", self.docker_bin)))?;

        if !output.status.success() {
            return Err(InventoryError::Runtime(format!(
                "trouble running \"{} inspect {container_id}\": {}",
                self.docker_bin,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let entries: Vec<InspectEntry> = serde_json::from_slice(&output.stdout)
            .map_err(|err| InventoryError::Runtime(format!("could not parse inspect output for {container_id}: {err}")))?;
        let entry = entries.into_iter().next().ok_or_else(|| {
            InventoryError::Runtime(format!("empty inspect output for {container_id}"))
        })?;

        let label = |name: &str| {
            entry.config.labels.get(name).cloned().ok_or_else(|| {
                InventoryError::Consistency(format!(
                    "container {container_id} is missing label {name}"
                ))
            })
        };

        Ok(ContainerDetails {
            working_dir: PathBuf::from(label(COMPOSE_WORKING_DIR_LABEL)?),
            config_files: label(COMPOSE_CONFIG_FILES_LABEL)?,
            service: label(COMPOSE_SERVICE_LABEL)?,
            running: entry.state.running,
            exit_code: entry.state.exit_code,
        })
    }
}

#[derive(Deserialize)]
struct InspectEntry {
    #[serde(rename = "Config")]
    config: InspectConfig,
    #[serde(rename = "State")]
    state: InspectState,
}

#[derive(Deserialize)]
struct InspectConfig {
    #[serde(rename = "Labels", default)]
    labels: HashMap<String, String>,
}

#[derive(Deserialize)]
struct InspectState {
    #[serde(rename = "Running", default)]
    running: bool,
    #[serde(rename = "ExitCode")]
    exit_code: Option<i32>,
}
