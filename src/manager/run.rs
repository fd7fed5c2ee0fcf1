use crate::compose::inventory::read_compose_state;
use crate::compose::runtime::DockerComposeCli;
use crate::event::{ApplicationEvent, EventConsumer};
use crate::executor::launch_spec::LaunchSpec;
use crate::manager::config::{AgentManagerConfig, ConfigError};
use crate::manager::defaults::DRAIN_TIMEOUT;
use crate::manager::error::AgentError;
use crate::manager::manager::{AgentManager, ComposeContext};
use crate::supervisor::instance::{InstanceRecord, TargetState};
use crate::utils::time::epoch_seconds;
use crossbeam::channel::RecvTimeoutError;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Hosts the supervisor main loop: reconciling instances on a timer,
/// refreshing container inventory on its own cadence, and reacting to
/// application events.
pub struct AgentManagerRunner {
    manager: AgentManager,
    compose: Option<ComposeContext>,
    inventory_interval: Duration,
}

impl AgentManagerRunner {
    /// Builds the runner and one instance record per configured agent.
    pub fn try_new(config: AgentManagerConfig) -> Result<Self, AgentError> {
        let compose = config.compose_file.clone().map(|file| ComposeContext {
            file,
            cli: DockerComposeCli::new(
                config.orchestrator.compose_bin.clone(),
                config.orchestrator.docker_bin.clone(),
            ),
        });

        let mut manager = AgentManager::new(config.tick_interval.into(), compose.clone());
        for (agent_id, agent) in config.agents {
            let target = if agent.run {
                TargetState::Up
            } else {
                TargetState::Down
            };
            let script = match (agent.exec, agent.service) {
                (Some(exec), None) => Some(LaunchSpec::Process(exec.into())),
                (None, Some(service)) => Some(LaunchSpec::ComposeService { service }),
                (None, None) => None,
                (Some(_), Some(_)) => {
                    return Err(AgentError::Config(ConfigError::Invalid(format!(
                        "agent `{agent_id}` declares both exec and service"
                    ))))
                }
            };
            let full_name = format!("{}:{}", agent.class, agent_id);
            let record = InstanceRecord::new(full_name, agent.class, script, target);
            manager.register(agent_id, record);
        }

        Ok(Self {
            manager,
            compose,
            inventory_interval: config.inventory_interval.into(),
        })
    }

    /// Runs until a stop is requested, then drains every instance to idle.
    pub fn run(mut self, events: EventConsumer<ApplicationEvent>) {
        info!("starting the agent supervisor runtime");
        let mut next_inventory = Instant::now();
        loop {
            if self.compose.is_some() && Instant::now() >= next_inventory {
                self.refresh_inventory();
                next_inventory = Instant::now() + self.inventory_interval;
            }

            let sleep = self.manager.tick(epoch_seconds());

            match events.as_ref().recv_timeout(sleep) {
                Ok(ApplicationEvent::StopRequested) => {
                    info!("stop requested");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("application event channel closed, stopping");
                    break;
                }
            }
        }
        self.drain();
        info!("agent supervisor runtime finished");
    }

    fn refresh_inventory(&mut self) {
        let Some(compose) = &self.compose else { return };
        match read_compose_state(&compose.cli, &compose.file) {
            Ok(observations) => self.manager.apply_observations(&observations),
            // The affected pass skips container observations; native
            // instances keep reconciling normally.
            Err(err) => warn!("skipping container observations for this pass: {err}"),
        }
    }

    /// Drives every instance to `down` through the normal path, bounded by
    /// the drain deadline; whatever refuses to die in time is abandoned.
    fn drain(&mut self) {
        info!("driving all managed agents down");
        self.manager.set_all_down();
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while !self.manager.all_idle() && Instant::now() < deadline {
            // An adopted external session flips its target back up; keep
            // re-lowering targets so nothing relaunches mid-drain.
            self.manager.set_all_down();
            let sleep = self.manager.tick(epoch_seconds());
            thread::sleep(sleep.min(Duration::from_millis(100)));
        }
        if !self.manager.all_idle() {
            warn!("some agent instances did not reach idle before the drain deadline");
        }
    }
}
