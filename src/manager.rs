//! Top-level wiring: validated agent identifiers, configuration, shared
//! constants, the [`manager::AgentManager`] collection driving each instance
//! through the reconciliation state machine, and the runner hosting the main
//! loop.

pub mod agent_id;
pub mod config;
pub mod defaults;
pub mod error;
#[allow(clippy::module_inception)]
pub mod manager;
pub mod run;
