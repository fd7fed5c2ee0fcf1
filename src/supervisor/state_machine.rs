use crate::manager::defaults::{
    LAUNCH_DETECT_GRACE_SECS, LAUNCH_RETRY_DELAY_SECS, RELAUNCH_COOLDOWN_SECS,
    SHUTDOWN_GRACE_SECS, STDERR_ATTACH_FULL_LIMIT, STDERR_ATTACH_TAIL_LINES,
};
use crate::supervisor::instance::{InstanceRecord, NextAction, TargetState};

/// Per-pass output of the state machine, directing the caller what to do.
///
/// `launch` and `terminate` are never both set. `sleep` is an upper bound on
/// how long the caller may wait before reconciling this instance again;
/// `None` means "no opinion".
#[derive(Debug, Default, PartialEq)]
pub struct Decision {
    pub messages: Vec<String>,
    pub launch: bool,
    pub terminate: bool,
    pub sleep: Option<f64>,
}

impl Decision {
    fn push_message(&mut self, message: String) {
        self.messages.push(message);
    }

    fn request_sleep(&mut self, seconds: f64) {
        let bounded = seconds.max(0.0);
        self.sleep = Some(self.sleep.map_or(bounded, |current| current.min(bounded)));
    }
}

/// Reconciles one instance record toward its target state.
///
/// Pure decision function: mutates the record in place, performs no I/O, and
/// takes the wall clock as epoch seconds so passes can be replayed in tests.
/// The transitional states (`wait_start`, `wait_dead`) are uninterruptible
/// and resolve before the target state is consulted; all other states pick
/// their transition from the target.
pub fn reconcile(record: &mut InstanceRecord, now: f64) -> Decision {
    let mut decision = Decision::default();

    match (record.next_action, record.target_state) {
        // Transitional: wait_start, which bridges start -> up.
        (NextAction::WaitStart, _) => {
            if record.child.is_some() {
                decision.push_message(format!("Launched {}", record.full_name));
                record.next_action = NextAction::Up;
            } else if now >= record.at {
                decision.push_message(format!(
                    "Launch not detected for {}! Will retry.",
                    record.full_name
                ));
                record.next_action = NextAction::StartAt;
                record.at = now + LAUNCH_RETRY_DELAY_SECS;
            } else {
                decision.request_sleep(record.at - now);
            }
        }

        // Transitional: wait_dead, which bridges up -> down. A missing
        // executor is treated as already dead.
        (NextAction::WaitDead, _) => {
            let stat = record
                .child
                .as_ref()
                .map_or(Some(0), |child| child.status().exit_code);
            if stat.is_some() {
                record.next_action = NextAction::Down;
            } else if now >= record.at {
                // The executor is abandoned; operator intervention implied.
                decision.push_message(format!(
                    "Agent instance {} refused to die.",
                    record.full_name
                ));
                record.next_action = NextAction::Down;
            } else {
                decision.request_sleep(record.at - now);
            }
        }

        (NextAction::StartAt, TargetState::Up) => {
            if now >= record.at {
                record.next_action = NextAction::Start;
            } else {
                decision.request_sleep(record.at - now);
            }
        }

        (NextAction::Start, TargetState::Up) => {
            if record.agent_script.is_none() {
                decision.push_message(format!(
                    "No launch spec registered for agent class: {}",
                    record.class_name
                ));
                record.next_action = NextAction::Down;
            } else {
                decision.push_message(format!("Requested launch for {}", record.full_name));
                record.child = None;
                decision.launch = true;
                record.next_action = NextAction::WaitStart;
                record.at = now + LAUNCH_DETECT_GRACE_SECS;
                record.push_start_time(now);
            }
        }

        (NextAction::Up, TargetState::Up) => {
            let exited = record
                .child
                .as_ref()
                .and_then(|child| child.status().exit_code.map(|code| (code, child.stderr_tail())));
            if let Some((code, stderr)) = exited {
                decision.push_message(format!(
                    "Detected exit of {} with code {code}.",
                    record.full_name
                ));
                if let Some(lines) = stderr {
                    attach_stderr(&record.full_name, lines, &mut decision);
                }
                record.next_action = NextAction::StartAt;
                record.at = now + RELAUNCH_COOLDOWN_SECS;
            }
        }

        (NextAction::Down, TargetState::Up) => {
            record.next_action = NextAction::Start;
        }

        (NextAction::Down, TargetState::Down) => {
            let alive = record
                .child
                .as_ref()
                .is_some_and(|child| !child.status().is_exited());
            if alive {
                // Reality wins: something external brought this child up, so
                // adopt it rather than fight it.
                decision.push_message(format!(
                    "Detected unexpected session for {} (probably externally managed); \
                     changing target state to \"up\".",
                    record.full_name
                ));
                record.target_state = TargetState::Up;
            }
        }

        (NextAction::Up, TargetState::Down) => {
            decision.push_message(format!("Requesting termination of {}", record.full_name));
            decision.terminate = true;
            record.next_action = NextAction::WaitDead;
            record.at = now + SHUTDOWN_GRACE_SECS;
        }

        (NextAction::StartAt | NextAction::Start, TargetState::Down) => {
            decision.push_message(format!(
                "Modifying state of {} from {} to idle",
                record.full_name, record.next_action
            ));
            record.next_action = NextAction::Down;
        }
    }

    decision
}

fn attach_stderr(full_name: &str, mut lines: Vec<String>, decision: &mut Decision) {
    let mut note = "";
    if lines.len() > STDERR_ATTACH_FULL_LIMIT {
        note = " (trimmed)";
        lines = lines.split_off(lines.len() - STDERR_ATTACH_TAIL_LINES);
    }
    decision.push_message(format!(
        "stderr output from {full_name}{note}: {}",
        lines.join("\n")
    ));
}
