//! End-to-end lifecycle tests driving real short-lived processes through the
//! public manager API.

#![cfg(target_family = "unix")]

use agent_manager::executor::launch_spec::{ExecutableData, LaunchSpec};
use agent_manager::manager::agent_id::AgentID;
use agent_manager::manager::defaults::DEFAULT_TICK_CEILING;
use agent_manager::manager::manager::AgentManager;
use agent_manager::supervisor::instance::{InstanceRecord, NextAction, TargetState};
use agent_manager::utils::time::epoch_seconds;
use std::thread;
use std::time::{Duration, Instant};

fn register_process(
    manager: &mut AgentManager,
    id: &str,
    bin: &str,
    args: &[&str],
    target: TargetState,
) -> AgentID {
    let agent_id = AgentID::new(id).unwrap();
    let exec = ExecutableData::new(bin.to_string())
        .with_args(args.iter().map(|a| a.to_string()).collect());
    let record = InstanceRecord::new(
        format!("TestAgent:{id}"),
        "TestAgent".to_string(),
        Some(LaunchSpec::Process(exec)),
        target,
    );
    manager.register(agent_id.clone(), record);
    agent_id
}

/// Keeps ticking until the instance satisfies the predicate or the timeout
/// elapses; returns whether the predicate held.
fn tick_until(
    manager: &mut AgentManager,
    agent_id: &AgentID,
    timeout: Duration,
    predicate: impl Fn(&InstanceRecord) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        manager.tick(epoch_seconds());
        if predicate(manager.instance(agent_id).unwrap()) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn clean_launch_and_graceful_stop() {
    let mut manager = AgentManager::new(DEFAULT_TICK_CEILING, None);
    let id = register_process(&mut manager, "long", "sleep", &["10"], TargetState::Up);

    // down -> start -> wait_start (spawn) -> up
    manager.tick(epoch_seconds());
    manager.tick(epoch_seconds());
    {
        let record = manager.instance(&id).unwrap();
        assert_eq!(record.next_action, NextAction::WaitStart);
        assert!(record.child.is_some());
        assert_eq!(record.start_times.len(), 1);
    }
    manager.tick(epoch_seconds());
    {
        let record = manager.instance(&id).unwrap();
        assert_eq!(record.next_action, NextAction::Up);
        assert!(!record.child.as_ref().unwrap().status().is_exited());
    }

    // Operator flips the target; the stop request goes out and the instance
    // settles at down well within the grace period.
    manager.set_target_state(&id, TargetState::Down).unwrap();
    manager.tick(epoch_seconds());
    assert_eq!(
        manager.instance(&id).unwrap().next_action,
        NextAction::WaitDead
    );

    assert!(tick_until(&mut manager, &id, Duration::from_secs(6), |r| {
        r.next_action == NextAction::Down
    }));
    // sleep does not handle SIGINT: the signal number is the exit code.
    let status = manager.instance(&id).unwrap().child.as_ref().unwrap().status();
    assert_eq!(status.exit_code, Some(2));
    assert!(manager.all_idle());
}

#[test]
fn unexpected_exit_enters_cooldown_and_relaunches() {
    let mut manager = AgentManager::new(DEFAULT_TICK_CEILING, None);
    let id = register_process(&mut manager, "flaky", "true", &[], TargetState::Up);

    manager.tick(epoch_seconds());
    manager.tick(epoch_seconds());
    manager.tick(epoch_seconds());
    assert_eq!(manager.instance(&id).unwrap().next_action, NextAction::Up);

    // The process exits almost immediately; once the exit watcher reports it
    // the machine schedules a cooled-down relaunch.
    assert!(tick_until(&mut manager, &id, Duration::from_secs(5), |r| {
        r.next_action == NextAction::StartAt
    }));
    let record = manager.instance(&id).unwrap();
    assert!(record.at > epoch_seconds());
    assert!(record.at <= epoch_seconds() + 3.5);

    // The cooldown holds until its deadline passes.
    manager.tick(epoch_seconds());
    assert_eq!(manager.instance(&id).unwrap().next_action, NextAction::StartAt);

    assert!(tick_until(&mut manager, &id, Duration::from_secs(5), |r| {
        r.start_times.len() >= 2
    }));
}

#[test]
fn stopped_target_down_instance_stays_idle() {
    let mut manager = AgentManager::new(DEFAULT_TICK_CEILING, None);
    let id = register_process(&mut manager, "parked", "sleep", &["10"], TargetState::Down);

    for _ in 0..3 {
        manager.tick(epoch_seconds());
    }
    let record = manager.instance(&id).unwrap();
    assert_eq!(record.next_action, NextAction::Down);
    assert!(record.child.is_none());
    assert!(record.start_times.is_empty());
}
