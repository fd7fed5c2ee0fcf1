use crate::compose::inventory::ServiceObservation;
use crate::compose::runtime::DockerComposeCli;
use crate::executor::container::ContainerServiceExecutor;
use crate::executor::launch_spec::LaunchSpec;
use crate::executor::process::ProcessExecutor;
use crate::executor::ChildExecutor;
use crate::manager::agent_id::AgentID;
use crate::manager::defaults::UNSTABLE_FACTOR_THRESHOLD;
use crate::manager::error::AgentError;
use crate::supervisor::instance::{InstanceRecord, InstanceStatus, TargetState};
use crate::supervisor::state_machine::{reconcile, Decision};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Compose stack the manager may allocate container executors against.
#[derive(Debug, Clone)]
pub struct ComposeContext {
    pub file: PathBuf,
    pub cli: DockerComposeCli,
}

/// Owns every instance record and drives each one through the reconciliation
/// state machine, executing the decisions it emits.
///
/// One `tick` reconciles every instance exactly once and returns the
/// tightest sleep the decisions asked for, bounded by the configured ceiling.
pub struct AgentManager {
    instances: HashMap<AgentID, InstanceRecord>,
    compose: Option<ComposeContext>,
    tick_ceiling: Duration,
}

impl AgentManager {
    pub fn new(tick_ceiling: Duration, compose: Option<ComposeContext>) -> Self {
        Self {
            instances: HashMap::new(),
            compose,
            tick_ceiling,
        }
    }

    pub fn register(&mut self, agent_id: AgentID, record: InstanceRecord) {
        self.instances.insert(agent_id, record);
    }

    pub fn set_target_state(
        &mut self,
        agent_id: &AgentID,
        target: TargetState,
    ) -> Result<(), AgentError> {
        let record = self
            .instances
            .get_mut(agent_id)
            .ok_or_else(|| AgentError::UnknownAgent(agent_id.to_string()))?;
        record.target_state = target;
        Ok(())
    }

    pub fn set_all_down(&mut self) {
        for record in self.instances.values_mut() {
            record.target_state = TargetState::Down;
        }
    }

    /// Deregisters an instance. Refused while the instance has not reached
    /// idle; drive it down through the normal path first.
    pub fn remove(&mut self, agent_id: &AgentID) -> Result<(), AgentError> {
        let record = self
            .instances
            .get(agent_id)
            .ok_or_else(|| AgentError::UnknownAgent(agent_id.to_string()))?;
        if !record.is_idle() {
            return Err(AgentError::NotIdle(agent_id.to_string()));
        }
        self.instances.remove(agent_id);
        Ok(())
    }

    pub fn instance(&self, agent_id: &AgentID) -> Option<&InstanceRecord> {
        self.instances.get(agent_id)
    }

    pub fn all_idle(&self) -> bool {
        self.instances.values().all(InstanceRecord::is_idle)
    }

    /// Reconciles every instance once and returns how long the caller may
    /// sleep before the next pass.
    pub fn tick(&mut self, now: f64) -> Duration {
        let mut sleep = self.tick_ceiling;
        for (agent_id, record) in self.instances.iter_mut() {
            let decision = reconcile(record, now);
            Self::execute_decision(&self.compose, agent_id, record, &decision, now);
            if let Some(requested) = decision.sleep {
                sleep = sleep.min(Duration::from_secs_f64(requested.max(0.0)));
            }
        }
        sleep
    }

    fn execute_decision(
        compose: &Option<ComposeContext>,
        agent_id: &AgentID,
        record: &mut InstanceRecord,
        decision: &Decision,
        now: f64,
    ) {
        for message in &decision.messages {
            info!(agent_id = %agent_id, "{message}");
        }

        if decision.launch {
            if let Some(factor) = record.update_stability(now) {
                if factor <= UNSTABLE_FACTOR_THRESHOLD {
                    warn!(agent_id = %agent_id, stability = factor, "agent is restarting frequently");
                }
            }
            match Self::allocate_executor(compose, agent_id, record) {
                Ok(mut child) => match child.launch() {
                    Ok(()) => record.child = Some(child),
                    // The record keeps no child; the launch-not-detected
                    // deadline turns this into a retry.
                    Err(err) => error!(agent_id = %agent_id, "launch request failed: {err}"),
                },
                Err(err) => error!(agent_id = %agent_id, "{err}"),
            }
        }

        if decision.terminate {
            if let Some(child) = record.child.as_mut() {
                if let Err(err) = child.stop() {
                    warn!(agent_id = %agent_id, "stop request failed: {err}");
                }
            }
        }
    }

    fn allocate_executor(
        compose: &Option<ComposeContext>,
        agent_id: &AgentID,
        record: &InstanceRecord,
    ) -> Result<Box<dyn ChildExecutor>, AgentError> {
        match &record.agent_script {
            Some(LaunchSpec::Process(exec)) => Ok(Box::new(ProcessExecutor::new(
                agent_id.to_string(),
                exec.clone(),
            ))),
            Some(LaunchSpec::ComposeService { service }) => {
                let context = compose
                    .as_ref()
                    .ok_or_else(|| AgentError::MissingComposeContext(agent_id.to_string()))?;
                Ok(Box::new(ContainerServiceExecutor::new(
                    context.cli.clone(),
                    context.file.clone(),
                    service.clone(),
                )))
            }
            None => Err(AgentError::MissingLaunchSpec(agent_id.to_string())),
        }
    }

    /// Folds a fresh observation map into the compose-managed instances.
    ///
    /// An instance with no executor whose service reports a found container
    /// gets one associated on the spot, seeded from the observation; that is
    /// how externally started containers become visible to the state machine.
    pub fn apply_observations(&mut self, observations: &HashMap<String, ServiceObservation>) {
        let Some(compose) = &self.compose else {
            return;
        };
        for record in self.instances.values_mut() {
            let Some(LaunchSpec::ComposeService { service }) = &record.agent_script else {
                continue;
            };
            let Some(observation) = observations.get(service) else {
                continue;
            };
            match record.child.as_mut() {
                Some(child) => child.apply_observation(observation),
                None if observation.container_found => {
                    record.child = Some(Box::new(ContainerServiceExecutor::from_observation(
                        compose.cli.clone(),
                        observation,
                    )));
                }
                None => {}
            }
        }
    }

    /// Point-in-time snapshot of every instance, sorted by agent id.
    pub fn status_report(&mut self, now: f64) -> Vec<InstanceStatus> {
        let mut report: Vec<InstanceStatus> = self
            .instances
            .iter_mut()
            .map(|(agent_id, record)| InstanceStatus {
                agent_id: agent_id.to_string(),
                class_name: record.class_name.clone(),
                target_state: record.target_state,
                next_action: record.next_action,
                stability: record.update_stability(now),
                exit_code: record.child.as_ref().and_then(|child| child.status().exit_code),
            })
            .collect();
        report.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::launch_spec::ExecutableData;
    use crate::manager::defaults::DEFAULT_TICK_CEILING;
    use crate::supervisor::instance::NextAction;
    use assert_matches::assert_matches;
    use tracing_test::traced_test;

    fn agent_id(s: &str) -> AgentID {
        AgentID::new(s).unwrap()
    }

    fn process_record(target: TargetState) -> InstanceRecord {
        InstanceRecord::new(
            "TestAgent:proc".to_string(),
            "TestAgent".to_string(),
            Some(LaunchSpec::Process(ExecutableData::new(
                "definitely-missing-binary-0xf".to_string(),
            ))),
            target,
        )
    }

    fn compose_manager() -> AgentManager {
        AgentManager::new(
            DEFAULT_TICK_CEILING,
            Some(ComposeContext {
                file: PathBuf::from("/srv/stack/docker-compose.yaml"),
                cli: DockerComposeCli::default(),
            }),
        )
    }

    fn service_record(target: TargetState) -> InstanceRecord {
        InstanceRecord::new(
            "ComposeService:web".to_string(),
            "ComposeService".to_string(),
            Some(LaunchSpec::ComposeService {
                service: "web".to_string(),
            }),
            target,
        )
    }

    fn web_observation(running: bool) -> HashMap<String, ServiceObservation> {
        HashMap::from([(
            "web".to_string(),
            ServiceObservation {
                compose_file: PathBuf::from("/srv/stack/docker-compose.yaml"),
                service: "web".to_string(),
                container_found: true,
                running,
                exit_code: if running { 127 } else { 1 },
            },
        )])
    }

    #[test]
    fn unknown_agent_is_an_error() {
        let mut manager = AgentManager::new(DEFAULT_TICK_CEILING, None);
        let missing = agent_id("missing");
        assert_matches!(
            manager.set_target_state(&missing, TargetState::Down),
            Err(AgentError::UnknownAgent(_))
        );
        assert_matches!(manager.remove(&missing), Err(AgentError::UnknownAgent(_)));
    }

    #[test]
    fn remove_refuses_a_non_idle_instance() {
        let mut manager = AgentManager::new(DEFAULT_TICK_CEILING, None);
        let id = agent_id("proc");
        manager.register(id.clone(), process_record(TargetState::Up));

        // One pass leaves the instance heading for a launch.
        manager.tick(1000.0);
        assert_matches!(manager.remove(&id), Err(AgentError::NotIdle(_)));

        manager.set_target_state(&id, TargetState::Down).unwrap();
        manager.tick(1000.0);
        manager.remove(&id).unwrap();
        assert!(manager.instance(&id).is_none());
    }

    #[traced_test]
    #[test]
    fn failed_launch_feeds_the_retry_path() {
        let mut manager = AgentManager::new(DEFAULT_TICK_CEILING, None);
        let id = agent_id("proc");
        manager.register(id.clone(), process_record(TargetState::Up));

        manager.tick(1000.0); // down -> start
        manager.tick(1000.0); // start -> wait_start, spawn fails
        assert!(logs_contain("Requested launch for TestAgent:proc"));
        assert!(logs_contain("launch request failed"));
        let record = manager.instance(&id).unwrap();
        assert_eq!(record.next_action, NextAction::WaitStart);
        assert!(record.child.is_none());

        // Past the detection deadline the machine schedules a retry.
        manager.tick(1001.1);
        assert!(logs_contain("Launch not detected for TestAgent:proc"));
        let record = manager.instance(&id).unwrap();
        assert_eq!(record.next_action, NextAction::StartAt);
    }

    #[traced_test]
    #[test]
    fn externally_started_container_flips_target_up() {
        let mut manager = compose_manager();
        let id = agent_id("web");
        manager.register(id.clone(), service_record(TargetState::Down));

        manager.apply_observations(&web_observation(true));
        let record = manager.instance(&id).unwrap();
        assert!(record.child.is_some());

        manager.tick(2000.0);
        assert!(logs_contain("unexpected session"));
        let record = manager.instance(&id).unwrap();
        assert_eq!(record.target_state, TargetState::Up);
    }

    #[test]
    fn remove_refuses_an_instance_with_a_live_external_child() {
        let mut manager = compose_manager();
        let id = agent_id("web");
        manager.register(id.clone(), service_record(TargetState::Down));

        // A container is discovered alive while next_action still reads
        // down; the record must not be dropped with its child running.
        manager.apply_observations(&web_observation(true));
        assert_matches!(manager.remove(&id), Err(AgentError::NotIdle(_)));
        assert!(!manager.all_idle());
        assert!(manager.instance(&id).is_some());
    }

    #[test]
    fn exited_container_observation_does_not_flip_target() {
        let mut manager = compose_manager();
        let id = agent_id("web");
        manager.register(id.clone(), service_record(TargetState::Down));

        manager.apply_observations(&web_observation(false));
        manager.tick(2000.0);
        let record = manager.instance(&id).unwrap();
        assert_eq!(record.target_state, TargetState::Down);
        assert!(record.is_idle());
    }

    #[test]
    fn observations_update_existing_executors() {
        let mut manager = compose_manager();
        let id = agent_id("web");
        manager.register(id.clone(), service_record(TargetState::Down));

        manager.apply_observations(&web_observation(true));
        manager.apply_observations(&web_observation(false));
        let record = manager.instance(&id).unwrap();
        let status = record.child.as_ref().unwrap().status();
        assert_eq!(status.exit_code, Some(1));
    }

    #[test]
    fn tick_honors_sleep_requests_under_the_ceiling() {
        let mut manager = AgentManager::new(DEFAULT_TICK_CEILING, None);
        let id = agent_id("proc");
        let mut record = process_record(TargetState::Up);
        record.next_action = NextAction::StartAt;
        record.at = 1000.4;
        manager.register(id, record);

        let sleep = manager.tick(1000.0);
        assert!(sleep <= Duration::from_secs_f64(0.4));

        // An empty manager sleeps the full ceiling.
        let mut empty = AgentManager::new(DEFAULT_TICK_CEILING, None);
        assert_eq!(empty.tick(1000.0), DEFAULT_TICK_CEILING);
    }

    #[test]
    fn status_report_is_sorted_and_complete() {
        let mut manager = AgentManager::new(DEFAULT_TICK_CEILING, None);
        manager.register(agent_id("zeta"), process_record(TargetState::Up));
        manager.register(agent_id("alpha"), process_record(TargetState::Down));

        let report = manager.status_report(1000.0);
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].agent_id, "alpha");
        assert_eq!(report[1].agent_id, "zeta");
        assert_eq!(report[0].target_state, TargetState::Down);
        assert_eq!(report[0].stability, None);
    }

    #[test]
    fn set_all_down_touches_every_instance() {
        let mut manager = AgentManager::new(DEFAULT_TICK_CEILING, None);
        manager.register(agent_id("a"), process_record(TargetState::Up));
        manager.register(agent_id("b"), process_record(TargetState::Up));

        manager.set_all_down();
        let report = manager.status_report(1000.0);
        assert!(report.iter().all(|s| s.target_state == TargetState::Down));
    }
}
