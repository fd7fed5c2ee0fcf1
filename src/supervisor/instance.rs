use crate::executor::launch_spec::LaunchSpec;
use crate::executor::ChildExecutor;
use crate::manager::defaults::{MAX_TRACKED_START_TIMES, STABILITY_WINDOW_SECS};
use crate::supervisor::stability::stability_factor;
use serde::Serialize;
use std::fmt::{self, Display};

/// Operator-declared desired lifecycle for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    Up,
    Down,
}

/// Position in the reconciliation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    /// Idle, no child expected.
    Down,
    /// Waiting for a backoff deadline before (re)launching.
    StartAt,
    /// Ready to launch immediately.
    Start,
    /// Launch requested, awaiting first evidence of the child.
    WaitStart,
    /// Child expected alive.
    Up,
    /// Stop requested, awaiting termination.
    WaitDead,
}

impl Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetState::Up => write!(f, "up"),
            TargetState::Down => write!(f, "down"),
        }
    }
}

impl Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextAction::Down => write!(f, "down"),
            NextAction::StartAt => write!(f, "start_at"),
            NextAction::Start => write!(f, "start"),
            NextAction::WaitStart => write!(f, "wait_start"),
            NextAction::Up => write!(f, "up"),
            NextAction::WaitDead => write!(f, "wait_dead"),
        }
    }
}

/// Per-agent state carried between reconciliation passes.
///
/// Mutated exclusively by [`crate::supervisor::state_machine::reconcile`];
/// the record exclusively owns its child executor. `at` is only meaningful
/// while `next_action` is one of the deadline-carrying states.
pub struct InstanceRecord {
    pub full_name: String,
    pub class_name: String,
    pub agent_script: Option<LaunchSpec>,
    pub target_state: TargetState,
    pub next_action: NextAction,
    /// Deadline of the current transitional step, in epoch seconds.
    pub at: f64,
    pub child: Option<Box<dyn ChildExecutor>>,
    /// Recent launch timestamps, monotonically non-decreasing and bounded.
    pub start_times: Vec<f64>,
}

impl InstanceRecord {
    pub fn new(
        full_name: String,
        class_name: String,
        agent_script: Option<LaunchSpec>,
        target_state: TargetState,
    ) -> Self {
        Self {
            full_name,
            class_name,
            agent_script,
            target_state,
            next_action: NextAction::Down,
            at: 0.0,
            child: None,
            start_times: Vec::new(),
        }
    }

    pub(crate) fn push_start_time(&mut self, now: f64) {
        self.start_times.push(now);
        if self.start_times.len() > MAX_TRACKED_START_TIMES {
            let excess = self.start_times.len() - MAX_TRACKED_START_TIMES;
            self.start_times.drain(..excess);
        }
    }

    /// Culls the start-time history against the stability window and returns
    /// the current stability factor, `None` when no launch happened yet.
    pub fn update_stability(&mut self, now: f64) -> Option<f64> {
        let (culled, factor) = stability_factor(&self.start_times, now, STABILITY_WINDOW_SECS);
        self.start_times = culled;
        factor
    }

    /// An idle instance has reached `down` with no live child. A dead child
    /// may stay associated until the next launch replaces it; one that still
    /// reports alive (externally discovered, or refusing to die) keeps the
    /// instance non-idle.
    pub fn is_idle(&self) -> bool {
        self.next_action == NextAction::Down
            && self
                .child
                .as_ref()
                .map_or(true, |child| child.status().is_exited())
    }
}

/// Serializable per-instance snapshot for operator-facing reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceStatus {
    pub agent_id: String,
    pub class_name: String,
    pub target_state: TargetState,
    pub next_action: NextAction,
    pub stability: Option<f64>,
    pub exit_code: Option<i32>,
}
