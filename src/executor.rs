//! Child executors: the variant-specific objects that actually start and stop
//! the process or container backing an agent instance.
//!
//! The reconciliation state machine depends only on [`ChildExecutor::status`];
//! launch and stop are invoked by the manager when a decision requests them.

pub mod container;
pub mod launch_spec;
pub mod process;

use crate::compose::inventory::ServiceObservation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("could not spawn process: `{0}`")]
    Spawn(#[from] std::io::Error),

    #[error("`{0}` not piped")]
    StreamPipe(String),

    #[error("could not signal process: `{0}`")]
    Signal(String),
}

/// Last known child state: `exit_code = None` means "still running (or launch
/// in flight)"; a code means "terminated with that code". `observed_at` is the
/// epoch-seconds timestamp of the observation, `None` until one exists.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChildStatus {
    pub exit_code: Option<i32>,
    pub observed_at: Option<f64>,
}

impl ChildStatus {
    /// Launch requested or confirmed, no exit seen.
    pub fn alive(now: f64) -> Self {
        Self {
            exit_code: None,
            observed_at: Some(now),
        }
    }

    pub fn exited(code: i32, now: f64) -> Self {
        Self {
            exit_code: Some(code),
            observed_at: Some(now),
        }
    }

    pub fn is_exited(&self) -> bool {
        self.exit_code.is_some()
    }
}

/// Capability set shared by all executor variants.
///
/// `launch` and `stop` are non-blocking requests; completion is observed later
/// through `status`. Variants differ in how status is learned: a native
/// process reports through its own exit watcher, a compose service is fed by
/// the container inventory reader through [`ChildExecutor::apply_observation`].
pub trait ChildExecutor: Send {
    /// Requests a start. Must leave the status as alive-unknown.
    fn launch(&mut self) -> Result<(), ExecutorError>;

    /// Requests graceful termination. Idempotent, best-effort; the state
    /// machine's wait-dead deadline covers children that refuse to die.
    fn stop(&mut self) -> Result<(), ExecutorError>;

    fn status(&self) -> ChildStatus;

    /// Identifier used in diagnostics.
    fn instance_id(&self) -> String;

    /// Recent stderr lines, for attachment on unexpected exit. `None` means
    /// the variant has no output capture capability.
    fn stderr_tail(&self) -> Option<Vec<String>> {
        None
    }

    /// Folds an externally produced observation into the status. Only the
    /// container variant reacts to this.
    fn apply_observation(&mut self, _observation: &ServiceObservation) {}
}
