use crate::compose::error::InventoryError;
use crate::compose::runtime::ComposeRuntime;
use crate::manager::defaults::UNKNOWN_EXIT_CODE;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Observed state of one declared compose service. `exit_code` is always
/// populated, defaulting to 127 when the runtime does not provide one.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceObservation {
    pub compose_file: PathBuf,
    pub service: String,
    pub container_found: bool,
    pub running: bool,
    pub exit_code: i32,
}

#[derive(Deserialize)]
struct ComposeFile {
    #[serde(default)]
    services: HashMap<String, serde_yaml::Value>,
}

/// Analyzes a compose file and the runtime's view of it, returning one
/// observation per declared service.
///
/// Containers whose labels point at a different compose file, or at a service
/// the file does not declare, fail the whole pass with a consistency error.
pub fn read_compose_state(
    runtime: &impl ComposeRuntime,
    compose_file: &Path,
) -> Result<HashMap<String, ServiceObservation>, InventoryError> {
    let mut summary = seed_observations(compose_file)?;

    for container_id in runtime.container_ids(compose_file)? {
        let details = runtime.inspect_container(&container_id)?;

        let labelled_file = details.working_dir.join(&details.config_files);
        if !is_same_file(compose_file, &labelled_file) {
            return Err(InventoryError::Consistency(format!(
                "container {container_id} was started from another compose file: {}",
                labelled_file.display()
            )));
        }

        let Some(observation) = summary.get_mut(&details.service) else {
            return Err(InventoryError::Consistency(format!(
                "container {container_id} reports undeclared service `{}`",
                details.service
            )));
        };
        observation.running = details.running;
        observation.exit_code = details.exit_code.unwrap_or(UNKNOWN_EXIT_CODE);
        observation.container_found = true;
    }

    Ok(summary)
}

fn seed_observations(
    compose_file: &Path,
) -> Result<HashMap<String, ServiceObservation>, InventoryError> {
    let file = File::open(compose_file).map_err(|err| {
        InventoryError::Config(format!(
            "could not read compose file {}: {err}",
            compose_file.display()
        ))
    })?;
    let compose: ComposeFile = serde_yaml::from_reader(file).map_err(|err| {
        InventoryError::Config(format!(
            "could not parse compose file {}: {err}",
            compose_file.display()
        ))
    })?;

    Ok(compose
        .services
        .into_keys()
        .map(|service| {
            let observation = ServiceObservation {
                compose_file: compose_file.to_path_buf(),
                service: service.clone(),
                container_found: false,
                running: false,
                exit_code: UNKNOWN_EXIT_CODE,
            };
            (service, observation)
        })
        .collect())
}

/// Whether two paths refer to the same filesystem object.
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
