use crate::compose::inventory::ServiceObservation;
use crate::compose::runtime::DockerComposeCli;
use crate::executor::{ChildExecutor, ChildStatus, ExecutorError};
use crate::utils::threads::spawn_named;
use crate::utils::time::epoch_seconds;
use std::path::PathBuf;
use tracing::{debug, error};

/// Drives one service of a compose stack through the orchestrator CLI.
///
/// Unlike the native variant, this executor holds no process handle: its
/// status is fed by the container inventory reader through
/// [`ChildExecutor::apply_observation`]. Launch and stop fire the
/// orchestrator commands on background threads so the reconciliation pass
/// never blocks on them.
pub struct ContainerServiceExecutor {
    cli: DockerComposeCli,
    compose_file: PathBuf,
    service: String,
    status: ChildStatus,
    killed: bool,
}

impl ContainerServiceExecutor {
    pub fn new(cli: DockerComposeCli, compose_file: PathBuf, service: String) -> Self {
        Self {
            cli,
            compose_file,
            service,
            status: ChildStatus::default(),
            killed: false,
        }
    }

    /// Adopts an externally observed container: the executor starts out with
    /// the status the observation reports.
    pub fn from_observation(cli: DockerComposeCli, observation: &ServiceObservation) -> Self {
        let mut executor = Self::new(
            cli,
            observation.compose_file.clone(),
            observation.service.clone(),
        );
        executor.apply_observation(observation);
        executor
    }
}

impl ChildExecutor for ContainerServiceExecutor {
    fn launch(&mut self) -> Result<(), ExecutorError> {
        self.status = ChildStatus::alive(epoch_seconds());
        self.killed = false;

        let cli = self.cli.clone();
        let compose_file = self.compose_file.clone();
        let service = self.service.clone();
        spawn_named(format!("{service} compose up"), move || {
            match cli.compose_up(&compose_file, &service) {
                Ok(output) if output.status.success() => {
                    debug!(service, "compose service brought up");
                }
                Ok(output) => error!(
                    service,
                    code = ?output.status.code(),
                    "compose up finished unsuccessfully: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                Err(err) => error!(service, "could not run compose up: {err}"),
            }
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ExecutorError> {
        if self.killed {
            return Ok(());
        }
        self.killed = true;

        let cli = self.cli.clone();
        let compose_file = self.compose_file.clone();
        let service = self.service.clone();
        spawn_named(format!("{service} compose rm"), move || {
            match cli.compose_rm(&compose_file, &service) {
                Ok(output) if output.status.success() => {
                    debug!(service, "compose service stopped and removed");
                }
                Ok(output) => error!(
                    service,
                    code = ?output.status.code(),
                    "compose rm finished unsuccessfully: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                Err(err) => error!(service, "could not run compose rm: {err}"),
            }
        });
        Ok(())
    }

    fn status(&self) -> ChildStatus {
        self.status
    }

    fn instance_id(&self) -> String {
        self.service.clone()
    }

    fn apply_observation(&mut self, observation: &ServiceObservation) {
        let now = epoch_seconds();
        self.status = if observation.running {
            ChildStatus::alive(now)
        } else {
            ChildStatus::exited(observation.exit_code, now)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn observation(running: bool, exit_code: i32) -> ServiceObservation {
        ServiceObservation {
            compose_file: PathBuf::from("/srv/stack/docker-compose.yaml"),
            service: "web".to_string(),
            container_found: true,
            running,
            exit_code,
        }
    }

    fn executor() -> ContainerServiceExecutor {
        ContainerServiceExecutor::new(
            DockerComposeCli::default(),
            PathBuf::from("/srv/stack/docker-compose.yaml"),
            "web".to_string(),
        )
    }

    #[test]
    fn status_starts_unknown() {
        let executor = executor();
        assert_eq!(executor.status(), ChildStatus::default());
        assert_eq!(executor.instance_id(), "web");
    }

    #[test]
    fn observation_drives_the_status() {
        let mut executor = executor();

        executor.apply_observation(&observation(true, 0));
        assert!(!executor.status().is_exited());
        assert!(executor.status().observed_at.is_some());

        executor.apply_observation(&observation(false, 137));
        assert_eq!(executor.status().exit_code, Some(137));
    }

    #[test]
    fn adopted_executor_reflects_the_observation() {
        let obs = observation(true, 0);
        let executor = ContainerServiceExecutor::from_observation(DockerComposeCli::default(), &obs);
        assert!(!executor.status().is_exited());
        assert_eq!(executor.instance_id(), "web");
        assert_eq!(executor.compose_file, Path::new("/srv/stack/docker-compose.yaml"));
    }

    #[test]
    fn launch_marks_alive_until_observed_otherwise() {
        let mut executor = executor();
        executor.launch().unwrap();
        assert!(!executor.status().is_exited());
        assert!(executor.status().observed_at.is_some());
    }

    #[test]
    fn stop_marks_killed_and_is_idempotent() {
        let mut executor = executor();
        executor.stop().unwrap();
        assert!(executor.killed);
        executor.stop().unwrap();
        assert!(executor.killed);
    }
}
