use crate::executor::launch_spec::ExecutableData;
use crate::executor::{ChildExecutor, ChildStatus, ExecutorError};
use crate::manager::defaults::{OUTPUT_RING_CAPACITY, UNKNOWN_EXIT_CODE};
use crate::utils::threads::spawn_named;
use crate::utils::time::epoch_seconds;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Bounded retention of captured output lines; old lines fall off the front.
struct OutputRing {
    lines: VecDeque<String>,
    capacity: usize,
}

impl OutputRing {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn tail(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

struct ProcessState {
    status: ChildStatus,
    killed: bool,
    pid: Option<u32>,
}

/// Supervises one native agent subprocess.
///
/// `launch` spawns the configured command with the ambient environment, stdin
/// closed, and stdout/stderr piped into reader threads that forward lines to
/// the log and retain a bounded tail for diagnostics. An exit watcher thread
/// records the exit code the moment the child terminates, so `status` never
/// blocks.
pub struct ProcessExecutor {
    instance_id: String,
    exec: ExecutableData,
    state: Arc<Mutex<ProcessState>>,
    stdout: Arc<Mutex<OutputRing>>,
    stderr: Arc<Mutex<OutputRing>>,
}

impl ProcessExecutor {
    pub fn new(instance_id: impl Into<String>, exec: ExecutableData) -> Self {
        Self {
            instance_id: instance_id.into(),
            exec,
            state: Arc::new(Mutex::new(ProcessState {
                status: ChildStatus::default(),
                killed: false,
                pid: None,
            })),
            stdout: Arc::new(Mutex::new(OutputRing::new(OUTPUT_RING_CAPACITY))),
            stderr: Arc::new(Mutex::new(OutputRing::new(OUTPUT_RING_CAPACITY))),
        }
    }

    fn spawn_output_reader<R>(&self, stream: &'static str, handle: R, ring: Arc<Mutex<OutputRing>>)
    where
        R: Read + Send + 'static,
    {
        let instance_id = self.instance_id.clone();
        spawn_named(format!("{instance_id} {stream} reader"), move || {
            for line in BufReader::new(handle).lines() {
                let Ok(line) = line else { break };
                debug!(agent_id = %instance_id, stream, "{line}");
                ring.lock().unwrap().push(line);
            }
        });
    }

    fn spawn_exit_watcher(&self, child: Child) {
        let state = self.state.clone();
        let instance_id = self.instance_id.clone();
        spawn_named(format!("{instance_id} exit watcher"), move || {
            let code = wait_exit_code(child);
            let mut state = state.lock().unwrap();
            state.status = ChildStatus::exited(code, epoch_seconds());
            state.pid = None;
        });
    }
}

impl ChildExecutor for ProcessExecutor {
    fn launch(&mut self) -> Result<(), ExecutorError> {
        let mut cmd = Command::new(&self.exec.bin);
        cmd.args(&self.exec.args)
            .envs(&self.exec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutorError::StreamPipe("stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutorError::StreamPipe("stderr".to_string()))?;

        {
            let mut state = self.state.lock().unwrap();
            state.status = ChildStatus::alive(epoch_seconds());
            state.killed = false;
            state.pid = Some(child.id());
        }

        self.spawn_output_reader("stdout", stdout, self.stdout.clone());
        self.spawn_output_reader("stderr", stderr, self.stderr.clone());
        self.spawn_exit_watcher(child);

        Ok(())
    }

    fn stop(&mut self) -> Result<(), ExecutorError> {
        let mut state = self.state.lock().unwrap();
        if state.killed {
            return Ok(());
        }
        state.killed = true;
        if state.status.is_exited() {
            return Ok(());
        }
        match state.pid {
            Some(pid) => interrupt(pid),
            None => Ok(()),
        }
    }

    fn status(&self) -> ChildStatus {
        self.state.lock().unwrap().status
    }

    fn instance_id(&self) -> String {
        self.instance_id.clone()
    }

    fn stderr_tail(&self) -> Option<Vec<String>> {
        Some(self.stderr.lock().unwrap().tail())
    }
}

fn wait_exit_code(mut child: Child) -> i32 {
    match child.wait() {
        Ok(status) => exit_code_of(status),
        Err(_) => UNKNOWN_EXIT_CODE,
    }
}

/// On unix a signal-terminated child carries no code; report the signal
/// number instead so the restart accounting still sees a value.
fn exit_code_of(status: ExitStatus) -> i32 {
    #[cfg(target_family = "unix")]
    {
        use std::os::unix::process::ExitStatusExt;
        status.code().or(status.signal()).unwrap_or_default()
    }
    #[cfg(not(target_family = "unix"))]
    {
        status.code().unwrap_or_default()
    }
}

#[cfg(target_family = "unix")]
fn interrupt(pid: u32) -> Result<(), ExecutorError> {
    use nix::sys::signal;
    use nix::unistd::Pid;
    signal::kill(Pid::from_raw(pid as i32), signal::SIGINT)
        .map_err(|err| ExecutorError::Signal(err.to_string()))
}

#[cfg(not(target_family = "unix"))]
fn interrupt(_pid: u32) -> Result<(), ExecutorError> {
    Ok(())
}
